//! Murmur - turn-taking orchestrator for a spoken conversational agent
//!
//! One turn captures speech, transcribes it, asks a dialogue model for a
//! reply, speaks the reply and goes back to listening or idle. Speech
//! recognition, dialogue and synthesis backends are pluggable and rebuilt
//! lazily whenever the settings change.

pub mod audio;
pub mod config;
pub mod error;
pub mod integration;
pub mod llm;
pub mod messages;
pub mod services;

pub use error::{ConfigError, Result, TurnError};

pub use config::{RecordingMode, Settings, SettingsStore};
pub use integration::{Orchestrator, OrchestratorEvent, OrchestratorHandle, TurnState};
pub use llm::{ContextAssembler, DialogueRequest};
pub use messages::{ChatMessage, HistoryStore, MessageStorage, Role};
pub use services::{
    BackendFactory, DialogueClient, PlaybackHandle, ServiceRegistry, Services, SpeechRecognizer,
    SpeechSynthesizer,
};
