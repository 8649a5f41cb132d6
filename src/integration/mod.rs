//! Turn orchestration
//!
//! Connects the audio monitor, the backend registry and the history store:
//! Voice -> STT -> dialogue -> TTS -> Playback

mod orchestrator;
mod state;

pub use orchestrator::{Orchestrator, OrchestratorHandle};
pub use state::{OrchestratorEvent, TurnState};
