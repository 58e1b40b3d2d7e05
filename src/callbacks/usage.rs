//! Usage tracking callback reporting back to the experimentation service.

use super::{CallbackHandler, TokenUsage};
use crate::fetch::InturaFetch;
use crate::types::TreatmentMetadata;
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reports input, output and token usage for one treatment/session.
///
/// Reporting is best effort: transport errors and rejected events are
/// logged at warn level and never reach the model invocation.
pub struct UsageTrackCallback {
    client: Arc<InturaFetch>,
    experiment_id: String,
    treatment_id: String,
    treatment_name: String,
    session_id: String,
    model_name: String,
}

impl UsageTrackCallback {
    pub fn new(
        client: Arc<InturaFetch>,
        metadata: &TreatmentMetadata,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            experiment_id: metadata.experiment_id.clone(),
            treatment_id: metadata.treatment_id.clone(),
            treatment_name: metadata.treatment_name.clone(),
            session_id: metadata.session_id.clone(),
            model_name: model_name.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Event body shared by every hook, with `key` set to `value`.
    pub fn event_payload(&self, key: &str, value: Value) -> Value {
        let mut payload = json!({
            "experiment_id": self.experiment_id,
            "treatment_id": self.treatment_id,
            "treatment_name": self.treatment_name,
            "session_id": self.session_id,
            "model": self.model_name,
        });
        if let Some(obj) = payload.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
        payload
    }

    fn report(&self, event: &str, outcome: Result<bool>) {
        match outcome {
            Ok(true) => debug!("Reported {} for session {}", event, self.session_id),
            Ok(false) => warn!("Service did not accept {} for session {}", event, self.session_id),
            Err(e) => warn!("Failed to report {} for session {}: {}", event, self.session_id, e),
        }
    }
}

impl CallbackHandler for UsageTrackCallback {
    fn name(&self) -> &str {
        "usage_track"
    }

    fn on_request_start(&self, messages: &Value) {
        let payload = self.event_payload("messages", messages.clone());
        self.report("chat input", self.client.insert_chat_input(payload));
    }

    fn on_response(&self, output: &Value) {
        let payload = self.event_payload("output", output.clone());
        self.report("chat output", self.client.insert_chat_output(payload));
    }

    fn on_usage(&self, usage: &TokenUsage) {
        let usage = serde_json::to_value(usage).unwrap_or(Value::Null);
        let payload = self.event_payload("usage", usage);
        if self.client.log_inference_event(&payload).is_none() {
            warn!("Usage report was not recorded for session {}", self.session_id);
        }
    }
}
