//! Dialogue request assembly
//!
//! Turns the persisted conversation into the request a dialogue backend
//! receives: a bounded, oldest-first window of messages, an optional system
//! prompt, and only the sampling tunables the backend understands.

pub mod context;

pub use context::{ContextAssembler, DialogueRequest, MessageRole, RequestMessage};
