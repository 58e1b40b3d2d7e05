//! 实验解析流水线：从服务端的实验分组配置构建可调用的模型
//!
//! Experiment resolution pipeline. Turns an experiment id into one or more
//! ready-to-invoke model handles:
//!
//! 1. validate caller history (no I/O happens for invalid input)
//! 2. fetch the ordered treatments from the service
//! 3. per treatment: resolve the provider, build the template, merge the
//!    configuration, attach usage tracking, construct the model
//! 4. collect up to `max_models` handles, skipping treatments that fail
//!
//! ```rust,no_run
//! use intura_ai::experiment::{BuildRequest, ChatModelExperiment};
//! use intura_ai::registry::FactoryTable;
//! use intura_ai::types::{ChatModel, ConversationMessage, ModelConfig};
//!
//! # fn main() -> intura_ai::Result<()> {
//! let table = FactoryTable::new().register_fn("langchain_openai", "ChatOpenAI", |cfg: ModelConfig| {
//!     Ok(Box::new(cfg) as Box<dyn ChatModel>)
//! });
//! let experiment = ChatModelExperiment::from_env(table)?;
//! let request = BuildRequest::new("exp-123").message(ConversationMessage::human("Hi"));
//! if let Some(outcome) = experiment.build(&request)? {
//!     println!("built {} model(s)", outcome.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod request;
pub mod validation;

pub use request::{BuildOutcome, BuildRequest};
pub use validation::MessageValidator;

use crate::callbacks::UsageTrackCallback;
use crate::config::ClientConfig;
use crate::fetch::InturaFetch;
use crate::registry::{ProviderLoader, ProviderRegistry};
use crate::types::{
    chat_template, ModelConfig, ModelHandle, TreatmentConfiguration, TreatmentMetadata,
};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Resolves experiments into model handles through a shared service client
/// and a lazily populated provider registry.
pub struct ChatModelExperiment {
    client: Arc<InturaFetch>,
    registry: ProviderRegistry,
    validator: MessageValidator,
    chosen_model: RwLock<Option<String>>,
    data: RwLock<Vec<Value>>,
}

impl ChatModelExperiment {
    pub fn new(client: Arc<InturaFetch>, loader: impl ProviderLoader + 'static) -> Result<Self> {
        Ok(Self {
            client,
            registry: ProviderRegistry::new(loader),
            validator: MessageValidator::new()?,
            chosen_model: RwLock::new(None),
            data: RwLock::new(Vec::new()),
        })
    }

    /// Build the service client from `config` (validating its key) first.
    pub fn with_config(config: ClientConfig, loader: impl ProviderLoader + 'static) -> Result<Self> {
        Self::new(Arc::new(InturaFetch::new(config)?), loader)
    }

    pub fn from_env(loader: impl ProviderLoader + 'static) -> Result<Self> {
        Self::with_config(ClientConfig::from_env(), loader)
    }

    /// The shared service client, also held by every tracking callback.
    pub fn fetch(&self) -> &Arc<InturaFetch> {
        &self.client
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Model name of the first treatment of the last single-model build.
    pub fn chosen_model(&self) -> Option<String> {
        self.chosen_model
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Raw treatment records fetched by the last build.
    pub fn data(&self) -> Vec<Value> {
        self.data.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Resolve the experiment into model handles.
    ///
    /// `Ok(None)` means nothing usable: invalid history, no data from the
    /// service, or every treatment failed. Only a failed request to the
    /// service is an error.
    pub fn build(&self, request: &BuildRequest) -> Result<Option<BuildOutcome>> {
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = tracing::info_span!(
            "build",
            experiment_id = %request.experiment_id,
            session_id = %session_id
        );
        let _enter = span.enter();

        if !request.messages.is_empty() {
            if let Err(e) = self.validator.validate(&request.messages) {
                error!("Invalid messages: {}", e);
                return Ok(None);
            }
        }

        info!("Building chat model for experiment: {}", request.experiment_id);
        if let Some(features) = &request.features {
            debug!("Using features: {}", features);
        }

        let Some(resp) = self
            .client
            .build_chat_model(&request.experiment_id, request.features.as_ref())?
        else {
            warn!("No data returned for experiment {}", request.experiment_id);
            return Ok(None);
        };
        *self.data.write().unwrap_or_else(|p| p.into_inner()) = resp.data.clone();
        if resp.data.is_empty() {
            warn!("No treatments returned for experiment {}", request.experiment_id);
            return Ok(None);
        }

        let max_models = request.max_models.max(1);
        let mut handles = Vec::new();
        for (index, raw) in resp.data.iter().enumerate() {
            let built = TreatmentConfiguration::from_value(raw)
                .and_then(|treatment| self.create_model_handle(&treatment, request, &session_id));
            match built {
                Ok(handle) => {
                    debug!("Added model: {}", handle.model_name);
                    handles.push(handle);
                    if handles.len() >= max_models {
                        break;
                    }
                }
                Err(e) if e.is_dependency_missing() => {
                    warn!("Skipping model due to missing dependencies: {}", e);
                }
                Err(e) => {
                    error!(
                        "Error creating model for treatment {}: {}",
                        treatment_label(index, raw),
                        e
                    );
                }
            }
        }

        if handles.is_empty() {
            warn!("No models could be built for experiment {}", request.experiment_id);
            return Ok(None);
        }

        if max_models == 1 {
            let chosen = resp.first_model_name().map(str::to_string);
            info!("Selected model: {}", chosen.as_deref().unwrap_or("<unknown>"));
            *self.chosen_model.write().unwrap_or_else(|p| p.into_inner()) = chosen;
            return Ok(handles.into_iter().next().map(BuildOutcome::Single));
        }

        info!("Built {} models", handles.len());
        Ok(Some(BuildOutcome::Many(handles)))
    }

    /// Construct the handle for one treatment.
    pub fn create_model_handle(
        &self,
        treatment: &TreatmentConfiguration,
        request: &BuildRequest,
        session_id: &str,
    ) -> Result<ModelHandle> {
        let factory = self
            .registry
            .resolve(&treatment.model_provider, &treatment.sdk_config)?;

        let history = if request.messages.is_empty() {
            Vec::new()
        } else {
            self.validator.validate(&request.messages)?
        };
        let template = chat_template(&treatment.prompt, &history);

        let params = treatment.filtered_configuration();
        let model_name = params
            .get("model")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::validation_with_context(
                    format!("Treatment {} has no model name", treatment.treatment_id),
                    ErrorContext::new()
                        .with_field_path("model_configuration.model")
                        .with_source("experiment"),
                )
            })?;
        let api_key = resolve_provider_key(request, &model_name)?;

        let metadata = TreatmentMetadata {
            experiment_id: request.experiment_id.clone(),
            treatment_id: treatment.treatment_id.clone(),
            treatment_name: treatment.treatment_name.clone(),
            session_id: session_id.to_string(),
        };
        let callback = Arc::new(UsageTrackCallback::new(
            self.client.clone(),
            &metadata,
            model_name.clone(),
        ));
        let config = ModelConfig::merged(
            params,
            api_key,
            callback,
            &metadata,
            &request.additional_model_configs,
        );

        let model = factory
            .create(config)
            .map_err(|source| Error::Provider {
                provider: treatment.model_provider.clone(),
                source,
            })?;

        Ok(ModelHandle {
            model,
            template,
            treatment_id: treatment.treatment_id.clone(),
            treatment_name: treatment.treatment_name.clone(),
            model_name,
        })
    }
}

/// The record's `treatment_id`, or its position when the id is unusable.
fn treatment_label(index: usize, raw: &Value) -> String {
    match raw.get("treatment_id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => format!("#{}", index),
    }
}

/// Override first, then the per-model mapping. A mapping that lacks the
/// model is an error; no mapping at all leaves the key to the provider.
fn resolve_provider_key(request: &BuildRequest, model_name: &str) -> Result<Option<String>> {
    if let Some(key) = &request.api_key_override {
        return Ok(Some(key.clone()));
    }
    match &request.api_key_mapping {
        Some(mapping) => mapping.get(model_name).cloned().map(Some).ok_or_else(|| {
            Error::validation_with_context(
                format!("No API key mapped for model '{}'", model_name),
                ErrorContext::new()
                    .with_field_path("api_key_mapping")
                    .with_source("experiment"),
            )
        }),
        None => Ok(None),
    }
}
