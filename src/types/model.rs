//! Model configuration, the merge that produces it, and model handles.

use crate::callbacks::CallbackHandler;
use crate::types::message::ChatTemplate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;

/// An opaque, invocable model client produced by a provider factory.
///
/// Every `Send + Sync` type qualifies; callers recover the concrete client
/// with [`ModelHandle::downcast_ref`].
pub trait ChatModel: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync> ChatModel for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub const MODEL_KEY: &str = "model";
pub const API_KEY_KEY: &str = "api_key";
pub const METADATA_KEY: &str = "metadata";
pub const CALLBACKS_KEY: &str = "callbacks";

/// Identifies the experiment arm a model was built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreatmentMetadata {
    pub experiment_id: String,
    pub treatment_id: String,
    pub treatment_name: String,
    pub session_id: String,
}

impl TreatmentMetadata {
    fn to_value(&self) -> Value {
        serde_json::json!({
            "experiment_id": self.experiment_id,
            "treatment_id": self.treatment_id,
            "treatment_name": self.treatment_name,
            "session_id": self.session_id,
        })
    }
}

/// Configuration handed to a provider's model constructor.
///
/// `params` holds provider keys (`model`, `temperature`, ...) together with
/// the common `api_key` and `metadata` entries; callbacks stay typed.
#[derive(Clone, Default)]
pub struct ModelConfig {
    pub params: Map<String, Value>,
    pub callbacks: Vec<Arc<dyn CallbackHandler>>,
}

impl ModelConfig {
    /// Layered merge, later layers winning on key collision:
    /// treatment parameters < api key < tracking callback and metadata <
    /// caller-supplied extras.
    ///
    /// A `callbacks` key among the extras cannot carry handlers and is dropped.
    pub fn merged(
        treatment_params: Map<String, Value>,
        api_key: Option<String>,
        callback: Arc<dyn CallbackHandler>,
        metadata: &TreatmentMetadata,
        additional: &Map<String, Value>,
    ) -> Self {
        let mut params = treatment_params;
        if let Some(key) = api_key {
            params.insert(API_KEY_KEY.to_string(), Value::String(key));
        }
        params.insert(METADATA_KEY.to_string(), metadata.to_value());
        for (k, v) in additional {
            if k == CALLBACKS_KEY {
                tracing::warn!("Ignoring '{}' in additional model configs", CALLBACKS_KEY);
                continue;
            }
            params.insert(k.clone(), v.clone());
        }
        Self {
            params,
            callbacks: vec![callback],
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn model_name(&self) -> Option<&str> {
        self.params.get(MODEL_KEY).and_then(Value::as_str)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.params.get(API_KEY_KEY).and_then(Value::as_str)
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.params.get(METADATA_KEY).and_then(Value::as_object)
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut redacted = self.params.clone();
        if redacted.contains_key(API_KEY_KEY) {
            redacted.insert(API_KEY_KEY.to_string(), Value::String("***".into()));
        }
        f.debug_struct("ModelConfig")
            .field("params", &redacted)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// A constructed model client paired with its conversation template.
pub struct ModelHandle {
    pub model: Box<dyn ChatModel>,
    pub template: ChatTemplate,
    pub treatment_id: String,
    pub treatment_name: String,
    pub model_name: String,
}

impl ModelHandle {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        // Deref first: `Box<dyn ChatModel>` is itself a `ChatModel`.
        (*self.model).as_any().downcast_ref::<T>()
    }

    pub fn into_parts(self) -> (Box<dyn ChatModel>, ChatTemplate) {
        (self.model, self.template)
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("treatment_id", &self.treatment_id)
            .field("treatment_name", &self.treatment_name)
            .field("model_name", &self.model_name)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}
