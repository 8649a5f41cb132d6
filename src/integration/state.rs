//! Turn state and the events reported to the presentation layer

use std::fmt;

/// Where the single conversation turn currently is
///
/// Driven only by the orchestrator, never persisted. "Responding" is derived
/// from the state rather than stored next to it, so combinations such as a
/// responding idle turn cannot exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TurnState {
    /// Nothing in flight
    #[default]
    Idle,
    /// Backends are being validated or built before capture starts
    AwaitingServices,
    /// The audio monitor is capturing the user's speech
    Listening,
    /// Recognition, dialogue and playback are running
    Processing,
}

impl TurnState {
    /// Whether `begin_turn` is currently gated
    pub fn is_responding(&self) -> bool {
        matches!(self, TurnState::AwaitingServices | TurnState::Processing)
    }

    pub fn is_listening(&self) -> bool {
        matches!(self, TurnState::Listening)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, TurnState::Idle)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "Idle"),
            TurnState::AwaitingServices => write!(f, "AwaitingServices"),
            TurnState::Listening => write!(f, "Listening"),
            TurnState::Processing => write!(f, "Processing"),
        }
    }
}

/// Events emitted by the orchestrator
#[derive(Clone, Debug, PartialEq)]
pub enum OrchestratorEvent {
    /// Turn state changed
    StateChanged(TurnState),

    /// Transcription result from speech recognition
    Transcription(String),

    /// Complete response from the dialogue backend
    Response(String),

    /// The spoken response finished playing
    PlaybackComplete,

    /// A turn failed
    Error {
        /// User-displayable description
        message: String,
        /// The user must change settings before retrying
        config_actionable: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responding_states() {
        assert!(!TurnState::Idle.is_responding());
        assert!(TurnState::AwaitingServices.is_responding());
        assert!(!TurnState::Listening.is_responding());
        assert!(TurnState::Processing.is_responding());
    }

    #[test]
    fn test_default_is_idle() {
        assert!(TurnState::default().is_idle());
        assert_eq!(TurnState::Listening.to_string(), "Listening");
    }
}
