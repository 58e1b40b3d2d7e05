//! Conversation messages supplied by callers and the chat templates built from them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Caller-side conversation turn. The system turn is never supplied by the
/// caller; it comes from the treatment prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ConversationMessage {
    pub role: ConversationRole,
    pub content: String,
}

impl ConversationMessage {
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::Human,
            content: text.into(),
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            role: ConversationRole::Ai,
            content: text.into(),
        }
    }
}

impl From<ConversationMessage> for serde_json::Value {
    fn from(msg: ConversationMessage) -> Self {
        serde_json::json!({
            "role": msg.role.as_str(),
            "content": msg.content,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    Human,
    Ai,
}

impl ConversationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationRole::Human => "human",
            ConversationRole::Ai => "ai",
        }
    }
}

/// One turn of a chat template handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: text.into(),
        }
    }
}

impl From<&ConversationMessage> for Message {
    fn from(msg: &ConversationMessage) -> Self {
        match msg.role {
            ConversationRole::Human => Message::user(msg.content.clone()),
            ConversationRole::Ai => Message::assistant(msg.content.clone()),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// System prompt followed by the caller's history, in input order.
pub type ChatTemplate = Vec<Message>;

pub fn chat_template(prompt: &str, history: &[ConversationMessage]) -> ChatTemplate {
    let mut template = Vec::with_capacity(history.len() + 1);
    template.push(Message::system(prompt));
    template.extend(history.iter().map(Message::from));
    template
}
