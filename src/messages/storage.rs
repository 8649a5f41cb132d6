use super::types::{ChatMessage, Role};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Persisted chat history as seen by the orchestrator
///
/// The orchestrator only appends and reads a recent window. Appends must be
/// atomic; `recent` returns messages oldest first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, content: &str, role: Role) -> anyhow::Result<ChatMessage>;

    async fn recent(&self, count: usize) -> anyhow::Result<Vec<ChatMessage>>;

    async fn len(&self) -> anyhow::Result<usize>;
}

#[derive(Debug, Default)]
struct StorageInner {
    messages: Vec<ChatMessage>,
    next_ordinal: u64,
}

#[derive(Debug, Clone)]
pub struct MessageStorage {
    inner: Arc<RwLock<StorageInner>>,
}

impl MessageStorage {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StorageInner::default())),
        }
    }

    pub fn add(&self, content: impl Into<String>, role: Role) -> ChatMessage {
        let mut inner = self.inner.write();
        let message = ChatMessage::new(inner.next_ordinal, role, content);
        inner.next_ordinal += 1;
        inner.messages.push(message.clone());
        message
    }

    pub fn get_all(&self) -> Vec<ChatMessage> {
        self.inner.read().messages.clone()
    }

    /// Last `count` messages, oldest first
    pub fn get_recent(&self, count: usize) -> Vec<ChatMessage> {
        let inner = self.inner.read();
        let start = inner.messages.len().saturating_sub(count);
        inner.messages[start..].to_vec()
    }

    pub fn clear(&self) {
        self.inner.write().messages.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().messages.is_empty()
    }

    /// Export history to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.inner.read().messages)
    }

    /// Replace history with messages from JSON
    pub fn from_json(&self, json: &str) -> Result<(), serde_json::Error> {
        let mut messages: Vec<ChatMessage> = serde_json::from_str(json)?;
        messages.sort_by_key(|m| m.ordinal);

        let mut inner = self.inner.write();
        inner.next_ordinal = messages.last().map_or(0, |m| m.ordinal + 1);
        inner.messages = messages;
        Ok(())
    }
}

impl Default for MessageStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MessageStorage {
    async fn append(&self, content: &str, role: Role) -> anyhow::Result<ChatMessage> {
        Ok(self.add(content, role))
    }

    async fn recent(&self, count: usize) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(self.get_recent(count))
    }

    async fn len(&self) -> anyhow::Result<usize> {
        Ok(MessageStorage::len(self))
    }
}
