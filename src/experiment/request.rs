use crate::types::{ConversationMessage, ModelHandle};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Arguments of [`super::ChatModelExperiment::build`].
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub experiment_id: String,
    /// Generated fresh per build when `None`.
    pub session_id: Option<String>,
    /// Feature context forwarded to the service for treatment selection.
    pub features: Option<Value>,
    pub max_models: usize,
    /// Raw history; each entry must be exactly `{role, content}`.
    pub messages: Vec<Value>,
    pub api_key_override: Option<String>,
    /// Model name -> provider API key.
    pub api_key_mapping: Option<HashMap<String, String>>,
    /// Merged last into every model configuration.
    pub additional_model_configs: Map<String, Value>,
}

impl BuildRequest {
    pub fn new(experiment_id: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            session_id: None,
            features: None,
            max_models: 1,
            messages: Vec::new(),
            api_key_override: None,
            api_key_mapping: None,
            additional_model_configs: Map::new(),
        }
    }

    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn features(mut self, features: Value) -> Self {
        self.features = Some(features);
        self
    }

    pub fn max_models(mut self, n: usize) -> Self {
        self.max_models = n.max(1);
        self
    }

    pub fn message(mut self, message: ConversationMessage) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = ConversationMessage>) -> Self {
        self.messages.extend(messages.into_iter().map(Value::from));
        self
    }

    /// Untyped history, validated at build time.
    pub fn raw_messages(mut self, messages: Vec<Value>) -> Self {
        self.messages = messages;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key_override = Some(key.into());
        self
    }

    pub fn api_key_mapping(mut self, mapping: HashMap<String, String>) -> Self {
        self.api_key_mapping = Some(mapping);
        self
    }

    pub fn additional_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional_model_configs.insert(key.into(), value);
        self
    }

    pub fn additional_model_configs(mut self, configs: Map<String, Value>) -> Self {
        self.additional_model_configs = configs;
        self
    }
}

/// Result of a successful build: a bare handle when one model was asked
/// for, otherwise the handles in service order.
#[derive(Debug)]
pub enum BuildOutcome {
    Single(ModelHandle),
    Many(Vec<ModelHandle>),
}

impl BuildOutcome {
    pub fn len(&self) -> usize {
        match self {
            BuildOutcome::Single(_) => 1,
            BuildOutcome::Many(handles) => handles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_single(self) -> Option<ModelHandle> {
        match self {
            BuildOutcome::Single(handle) => Some(handle),
            BuildOutcome::Many(_) => None,
        }
    }

    pub fn into_vec(self) -> Vec<ModelHandle> {
        match self {
            BuildOutcome::Single(handle) => vec![handle],
            BuildOutcome::Many(handles) => handles,
        }
    }
}
