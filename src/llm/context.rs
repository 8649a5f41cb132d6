//! Conversation context assembly for dialogue requests

use crate::config::DialogueSettings;
use crate::messages::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role of a message in a dialogue request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

impl MessageRole {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

/// A single message in a dialogue request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub role: MessageRole,
    pub content: String,
}

impl RequestMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

/// What a dialogue backend is asked to answer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogueRequest {
    /// Ordered oldest to newest, system prompt first when present
    pub messages: Vec<RequestMessage>,
    /// Target model identifier
    pub model: String,
    /// Backend tunables; empty for backends that ignore them
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// Builds dialogue requests from persisted history
///
/// Pure: reads its inputs, touches no storage, and returns the same request
/// for the same arguments.
pub struct ContextAssembler;

impl ContextAssembler {
    pub const TEMPERATURE: &'static str = "temperature";
    pub const TOP_P: &'static str = "top_p";

    pub fn build_request(recent: &[ChatMessage], dialogue: &DialogueSettings) -> DialogueRequest {
        let mut window: Vec<&ChatMessage> = recent.iter().collect();
        window.sort_by_key(|m| m.ordinal);

        let mut messages = Vec::with_capacity(window.len() + 1);

        let prompt = dialogue.system_prompt.trim();
        if dialogue.kind.supports_system_prompt() && !prompt.is_empty() {
            messages.push(RequestMessage::system(prompt));
        }

        messages.extend(
            window
                .into_iter()
                .map(|m| RequestMessage::new(m.role.into(), m.content.clone())),
        );

        let mut parameters = BTreeMap::new();
        if dialogue.kind.supports_sampling() {
            parameters.insert(
                Self::TEMPERATURE.to_string(),
                serde_json::Value::from(dialogue.temperature),
            );
            parameters.insert(
                Self::TOP_P.to_string(),
                serde_json::Value::from(dialogue.top_p),
            );
        }

        DialogueRequest {
            messages,
            model: dialogue.model.clone(),
            parameters,
        }
    }
}
