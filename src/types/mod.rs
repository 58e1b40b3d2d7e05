//! Core data types.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TreatmentConfiguration`] | One experiment variant fetched from the service |
//! | [`ConversationMessage`] | Caller-supplied history turn (`human` / `ai`) |
//! | [`ChatTemplate`] | System prompt plus history, ready for a provider |
//! | [`ModelConfig`] | Merged configuration passed to a provider constructor |
//! | [`ModelHandle`] | Constructed model client paired with its template |

pub mod message;
pub mod model;
pub mod treatment;

pub use message::{
    chat_template, ChatTemplate, ConversationMessage, ConversationRole, Message, MessageRole,
};
pub use model::{ChatModel, ModelConfig, ModelHandle, TreatmentMetadata};
pub use treatment::{BuildChatModelResponse, SdkConfig, TreatmentConfiguration};
