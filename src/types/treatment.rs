//! Treatment configurations returned by the experimentation service.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Locator for a provider's model constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SdkConfig {
    pub module_path: String,
    pub class_name: String,
}

impl SdkConfig {
    pub fn new(module_path: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            class_name: class_name.into(),
        }
    }
}

/// One candidate variant of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentConfiguration {
    #[serde(deserialize_with = "string_or_number")]
    pub treatment_id: String,
    pub treatment_name: String,
    pub model_provider: String,
    pub sdk_config: SdkConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt: String,
    /// Null values mean "unset": the provider picks its own default.
    #[serde(default, deserialize_with = "null_as_default")]
    pub model_configuration: Map<String, Value>,
}

impl TreatmentConfiguration {
    /// Decode one raw treatment record.
    ///
    /// A malformed record is an [`Error::Validation`] for that treatment
    /// alone; the rest of the response stays usable.
    pub fn from_value(raw: &Value) -> Result<Self> {
        serde_json::from_value(raw.clone()).map_err(|e| {
            let mut context = ErrorContext::new().with_source("treatment");
            if let Some(id) = raw.get("treatment_id") {
                context = context.with_details(format!("treatment_id={}", id));
            }
            Error::validation_with_context(format!("Malformed treatment: {}", e), context)
        })
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_configuration.get("model").and_then(Value::as_str)
    }

    /// `model_configuration` without its null-valued entries.
    pub fn filtered_configuration(&self) -> Map<String, Value> {
        self.model_configuration
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Body of a successful `experiment/build/chat` call.
///
/// Records stay raw until they are used so that one malformed treatment
/// cannot hide the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildChatModelResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<Value>,
}

impl BuildChatModelResponse {
    /// Each record decoded on its own, in service order.
    pub fn treatments(&self) -> impl Iterator<Item = Result<TreatmentConfiguration>> + '_ {
        self.data.iter().map(TreatmentConfiguration::from_value)
    }

    /// `model_configuration.model` of the first record, malformed or not.
    pub fn first_model_name(&self) -> Option<&str> {
        self.data
            .first()?
            .get("model_configuration")?
            .get("model")?
            .as_str()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Input {
        Text(String),
        Number(serde_json::Number),
    }

    match Input::deserialize(deserializer)? {
        Input::Text(s) => Ok(s),
        Input::Number(n) => Ok(n.to_string()),
    }
}
