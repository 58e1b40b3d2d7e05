//! # intura-ai
//!
//! 实验驱动的聊天模型 SDK：按实验配置选择并构建模型，并上报用量。
//!
//! Experimentation SDK for chat models. An experiment on the Intura service
//! holds ordered treatments, each naming a provider, a model configuration
//! and a system prompt. This crate fetches those treatments, builds
//! invocable model clients for them and reports usage back.
//!
//! ## Overview
//!
//! - **Fetch client**: [`InturaFetch`] is a typed, authenticated client for
//!   the service. "No data" is `None`/`false`, never an error.
//! - **Provider registry**: [`registry::ProviderRegistry`] resolves provider
//!   constructors lazily and caches them; a missing provider only skips the
//!   treatments that need it.
//! - **Experiment pipeline**: [`ChatModelExperiment`] turns an experiment id
//!   into one or more [`types::ModelHandle`]s.
//! - **Usage tracking**: every built model carries a
//!   [`callbacks::UsageTrackCallback`] bound to its treatment and session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use intura_ai::{BuildRequest, ChatModelExperiment, ClientConfig};
//! use intura_ai::registry::FactoryTable;
//! use intura_ai::types::{ChatModel, ConversationMessage, ModelConfig};
//!
//! fn main() -> intura_ai::Result<()> {
//!     intura_ai::logging::init(&intura_ai::logging::LogConfig::default());
//!
//!     let providers = FactoryTable::new().register_fn(
//!         "langchain_openai",
//!         "ChatOpenAI",
//!         |cfg: ModelConfig| Ok(Box::new(cfg) as Box<dyn ChatModel>),
//!     );
//!     let experiment = ChatModelExperiment::with_config(
//!         ClientConfig::from_env().with_api_key("your-intura-key"),
//!         providers,
//!     )?;
//!
//!     let request = BuildRequest::new("exp-123")
//!         .message(ConversationMessage::human("Hello"))
//!         .max_models(2);
//!     if let Some(outcome) = experiment.build(&request)? {
//!         for handle in outcome.into_vec() {
//!             println!("{} -> {}", handle.treatment_name, handle.model_name);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`fetch`] | Typed client for the experimentation service |
//! | [`transport`] | Signed HTTP execution and API key discovery |
//! | [`registry`] | Lazy provider resolution and caching |
//! | [`experiment`] | Experiment resolution pipeline |
//! | [`callbacks`] | Model-invocation hooks and usage tracking |
//! | [`types`] | Treatments, messages, model configuration and handles |
//! | [`config`] | Client configuration (env, YAML, builder) |
//! | [`logging`] | `tracing` subscriber setup with per-component levels |

pub mod callbacks;
pub mod config;
pub mod experiment;
pub mod fetch;
pub mod logging;
pub mod registry;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use callbacks::{CallbackHandler, TokenUsage, UsageTrackCallback};
pub use config::ClientConfig;
pub use experiment::{BuildOutcome, BuildRequest, ChatModelExperiment};
pub use fetch::InturaFetch;
pub use types::{
    ConversationMessage, ConversationRole, ModelConfig, ModelHandle, TreatmentConfiguration,
};

/// Crate version reported in logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
