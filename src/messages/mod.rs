pub mod storage;
pub mod types;

pub use storage::{HistoryStore, MessageStorage};
pub use types::{ChatMessage, Role};
