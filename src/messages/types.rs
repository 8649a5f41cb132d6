use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A persisted conversation message
///
/// `ordinal` is assigned by the store and increases with every append, so it
/// orders messages even when two share a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub ordinal: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(ordinal: u64, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ordinal,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
