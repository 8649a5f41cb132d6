//! Backend contracts and the registry that owns the active backends
//!
//! The orchestrator only sees these traits. Concrete recognizers, dialogue
//! clients and synthesizers are produced by a `BackendFactory` from the
//! matching settings section.

mod registry;

pub use registry::{ServiceRegistry, Services};

use crate::config::{DialogueSettings, RecognitionSettings, SynthesisSettings};
use crate::llm::DialogueRequest;
use async_trait::async_trait;
use std::sync::Arc;

/// Speech-to-text backend
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe mono 16-bit samples
    async fn recognize(&self, samples: &[i16]) -> anyhow::Result<String>;
}

/// Dialogue model backend
#[async_trait]
pub trait DialogueClient: Send + Sync {
    /// Send the request and return the complete response text
    async fn send(&self, request: &DialogueRequest) -> anyhow::Result<String>;
}

/// Text-to-speech backend
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Start speaking `text`, returning a handle to the audio being played
    async fn speak(&self, text: &str) -> anyhow::Result<Box<dyn PlaybackHandle>>;
}

/// Audio started by a synthesizer
#[async_trait]
pub trait PlaybackHandle: Send {
    /// Suspend until the audio output has fully drained
    async fn wait_for_completion(&mut self) -> anyhow::Result<()>;
}

/// Builds concrete backends from their settings sections
///
/// Settings reaching the factory have already been validated. A factory may
/// still refuse them (unreachable endpoint, unknown model, rejected key).
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn recognizer(
        &self,
        settings: &RecognitionSettings,
    ) -> anyhow::Result<Arc<dyn SpeechRecognizer>>;

    async fn dialogue(&self, settings: &DialogueSettings) -> anyhow::Result<Arc<dyn DialogueClient>>;

    async fn synthesizer(
        &self,
        settings: &SynthesisSettings,
    ) -> anyhow::Result<Arc<dyn SpeechSynthesizer>>;
}
