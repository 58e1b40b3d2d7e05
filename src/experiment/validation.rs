//! Conversation history validation.
//!
//! The per-message schema is generated from [`ConversationMessage`] and
//! checked with JSON Schema, so the wire shape and the Rust type cannot
//! drift apart.

use crate::types::{ConversationMessage, ConversationRole};
use crate::{Error, ErrorContext, Result};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::Value;

static MESSAGE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let schema = schemars::schema_for!(ConversationMessage);
    serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({}))
});

pub struct MessageValidator {
    schema: JSONSchema,
}

impl MessageValidator {
    pub fn new() -> Result<Self> {
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&MESSAGE_SCHEMA)
            .map_err(|e| {
                Error::configuration_with_context(
                    format!("Failed to compile message schema: {}", e),
                    ErrorContext::new().with_source("message_validator"),
                )
            })?;
        Ok(Self { schema })
    }

    /// Check and parse caller history.
    ///
    /// Every entry must be exactly `{role, content}` with role `human` or
    /// `ai`, and at least one entry must be `human`. Callers skip this for an
    /// empty history.
    pub fn validate(&self, messages: &[Value]) -> Result<Vec<ConversationMessage>> {
        let mut parsed = Vec::with_capacity(messages.len());
        for (index, message) in messages.iter().enumerate() {
            self.check_schema(index, message)?;
            let msg: ConversationMessage =
                serde_json::from_value(message.clone()).map_err(|e| {
                    Error::validation_with_context(
                        format!("Message {} could not be parsed: {}", index, e),
                        ErrorContext::new()
                            .with_field_path(format!("messages[{}]", index))
                            .with_source("message_validator"),
                    )
                })?;
            parsed.push(msg);
        }

        if !parsed.iter().any(|m| m.role == ConversationRole::Human) {
            return Err(Error::validation_with_context(
                "Messages must contain at least one 'human' message",
                ErrorContext::new()
                    .with_field_path("messages")
                    .with_source("message_validator"),
            ));
        }
        Ok(parsed)
    }

    fn check_schema(&self, index: usize, message: &Value) -> Result<()> {
        let first = match self.schema.validate(message) {
            Ok(()) => return Ok(()),
            Err(mut errors) => errors.next(),
        };
        let Some(error) = first else {
            return Ok(());
        };

        let (text, field) = match &error.kind {
            ValidationErrorKind::AdditionalProperties { unexpected } => (
                format!(
                    "Message {} has unexpected key(s) {}; only 'role' and 'content' are allowed",
                    index,
                    quoted(unexpected)
                ),
                format!("messages[{}].{}", index, unexpected.join(",")),
            ),
            ValidationErrorKind::Required { property } => {
                let name = property.as_str().unwrap_or("?").to_string();
                (
                    format!("Message {} is missing required key '{}'", index, name),
                    format!("messages[{}].{}", index, name),
                )
            }
            _ => {
                let pointer = error.instance_path.to_string();
                let suffix = pointer.trim_start_matches('/').replace('/', ".");
                let field = if suffix.is_empty() {
                    format!("messages[{}]", index)
                } else {
                    format!("messages[{}].{}", index, suffix)
                };
                (format!("Message {} is invalid: {}", index, error), field)
            }
        };

        Err(Error::validation_with_context(
            text,
            ErrorContext::new()
                .with_field_path(field)
                .with_source("message_validator"),
        ))
    }
}

fn quoted(keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("'{}'", k))
        .collect::<Vec<_>>()
        .join(", ")
}
