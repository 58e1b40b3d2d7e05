//! Typed client for the experimentation service.
//!
//! Failure policy: a request that never completes is an
//! [`Error::Transport`](crate::Error::Transport); a completed request with a
//! non-200 status or an unusable body is "no data" and comes back as
//! `None`/`false`. The service legitimately answers with empty results, so
//! callers must not treat `None` as an error.

pub mod endpoint;

pub use endpoint::Endpoint;

use crate::config::ClientConfig;
use crate::transport::{HttpTransport, Method};
use crate::types::BuildChatModelResponse;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const EVENT_CHAT_INPUT: &str = "CHAT_MODEL_INPUT";
pub const EVENT_CHAT_OUTPUT: &str = "CHAT_MODEL_OUTPUT";
pub const EVENT_CHAT_USAGE: &str = "CHAT_MODEL_USAGE";
pub const CATEGORY_CHAT_LOG: &str = "CHAT_LOG";
pub const CATEGORY_CHAT_USAGE: &str = "CHAT_USAGE";
const RESERVED_REWARD: &str = "RESERVED_REWARD";

/// Authenticated, blocking client for the Intura experimentation service.
pub struct InturaFetch {
    transport: HttpTransport,
}

impl InturaFetch {
    /// Build the client and check the API key against the service.
    ///
    /// Fails with [`Error::Authentication`] when no key can be found or the
    /// service rejects it.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config).map_err(|e| {
            if matches!(e, Error::Authentication { .. }) {
                error!("Intura API key not found");
            }
            e
        })?;
        let client = Self { transport };

        if !client.validate_key()? {
            error!("Invalid Intura API key");
            return Err(Error::authentication("Invalid Intura API key"));
        }

        debug!("InturaFetch initialized successfully (intura-ai {})", crate::VERSION);
        Ok(client)
    }

    /// Configuration from `INTURA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::new(ClientConfig::from_env().with_api_key(api_key))
    }

    pub fn api_key(&self) -> &str {
        self.transport.api_key()
    }

    fn get(&self, endpoint: Endpoint, query: Option<&[(&str, &str)]>) -> Result<Option<Value>> {
        self.transport.execute(Method::Get, endpoint.path(), query, None)
    }

    fn post(&self, endpoint: Endpoint, body: &Value) -> Result<Option<Value>> {
        self.transport
            .execute(Method::Post, endpoint.path(), None, Some(body))
    }

    pub fn validate_key(&self) -> Result<bool> {
        debug!("Validating API key");
        Ok(self.get(Endpoint::ValidateApiKey, None)?.is_some())
    }

    pub fn list_experiments(&self) -> Result<Option<Vec<Value>>> {
        debug!("Fetching list of experiments");
        Ok(self.get(Endpoint::Experiment, None)?.and_then(data_array))
    }

    /// Create an experiment; returns its id.
    pub fn create_experiment<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Option<String>> {
        debug!("Creating new experiment");
        let body = serde_json::to_value(payload)?;
        let id = self
            .post(Endpoint::Experiment, &body)?
            .and_then(|resp| resp.get("data")?.get("experiment_id").cloned())
            .and_then(|id| match id {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        if let Some(ref id) = id {
            info!("Created experiment with ID: {}", id);
        }
        Ok(id)
    }

    pub fn list_models(&self) -> Result<Option<Vec<Value>>> {
        debug!("Fetching list of models");
        Ok(self.get(Endpoint::ListModels, None)?.and_then(data_array))
    }

    pub fn check_experiment_id(&self, experiment_id: &str) -> Result<bool> {
        debug!("Validating experiment ID: {}", experiment_id);
        let query = [("experiment_id", experiment_id)];
        Ok(self
            .get(Endpoint::ValidateExperiment, Some(&query[..]))?
            .is_some())
    }

    pub fn get_experiment_detail(&self, experiment_id: &str) -> Result<Option<Value>> {
        debug!("Fetching details for experiment: {}", experiment_id);
        let query = [("experiment_id", experiment_id)];
        Ok(self
            .get(Endpoint::ExperimentDetail, Some(&query[..]))?
            .and_then(|mut resp| resp.get_mut("data").map(Value::take)))
    }

    /// Ask the service for the treatments of `experiment_id`, in its order.
    pub fn build_chat_model(
        &self,
        experiment_id: &str,
        features: Option<&Value>,
    ) -> Result<Option<BuildChatModelResponse>> {
        debug!("Building chat model for experiment: {}", experiment_id);
        let body = json!({
            "features": features.cloned().unwrap_or_else(|| json!({})),
            "experiment_id": experiment_id,
        });
        let Some(resp) = self.post(Endpoint::BuildChatModel, &body)? else {
            return Ok(None);
        };
        match serde_json::from_value::<BuildChatModelResponse>(resp) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                warn!("Malformed build response for experiment {}: {}", experiment_id, e);
                Ok(None)
            }
        }
    }

    /// Record an inference. Never fails: errors are logged and reported as `None`.
    pub fn log_inference_event(&self, payload: &Value) -> Option<Value> {
        let session_id = payload
            .get("session_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        debug!("Logging inference for session: {}", session_id);
        match self.post(Endpoint::InsertInference, payload) {
            Ok(resp) => resp,
            Err(e) => {
                error!("Error logging inference: {}", e);
                None
            }
        }
    }

    /// Report a reward event. `prediction_id` defaults to a fresh UUID.
    pub fn track_event(
        &self,
        event_name: &str,
        event_value: Value,
        reward_category: &str,
        prediction_id: Option<&str>,
    ) -> Result<bool> {
        let prediction_id = prediction_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let body = json!({
            "body": {
                "event_name": event_name,
                "event_value": event_value,
                "attributes": {},
                "prediction_id": prediction_id,
            },
            "reward_type": RESERVED_REWARD,
            "reward_category": reward_category,
        });
        debug!(
            "Tracking event: {} in category: {}",
            event_name, reward_category
        );
        Ok(self.post(Endpoint::TrackReward, &body)?.is_some())
    }

    pub fn insert_chat_input(&self, values: Value) -> Result<bool> {
        self.track_event(EVENT_CHAT_INPUT, values, CATEGORY_CHAT_LOG, None)
    }

    pub fn insert_chat_output(&self, values: Value) -> Result<bool> {
        self.track_event(EVENT_CHAT_OUTPUT, values, CATEGORY_CHAT_LOG, None)
    }

    pub fn insert_chat_usage(&self, values: Value) -> Result<bool> {
        self.track_event(EVENT_CHAT_USAGE, values, CATEGORY_CHAT_USAGE, None)
    }
}

fn data_array(mut resp: Value) -> Option<Vec<Value>> {
    match resp.get_mut("data").map(Value::take) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}
