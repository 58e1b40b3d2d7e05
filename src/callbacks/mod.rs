//! Model-invocation hooks.
//!
//! Providers call these hook points while a model runs. All methods default
//! to no-ops and return nothing: a hook cannot fail the invocation.

pub mod usage;

pub use usage::UsageTrackCallback;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token accounting reported by a provider after a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

pub trait CallbackHandler: Send + Sync {
    fn name(&self) -> &str {
        "callback"
    }

    /// The provider is about to send `messages`.
    fn on_request_start(&self, messages: &Value) {
        let _ = messages;
    }

    /// The provider produced `output`.
    fn on_response(&self, output: &Value) {
        let _ = output;
    }

    /// Token usage became available.
    fn on_usage(&self, usage: &TokenUsage) {
        let _ = usage;
    }
}
