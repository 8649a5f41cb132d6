//! Error types for the turn orchestrator
//!
//! `ConfigError` is the only class the user can act on without retrying:
//! the settings must be fixed. Every other `TurnError` aborts the current
//! turn and is recovered by starting a fresh one.

use thiserror::Error;

/// Configuration missing, invalid, or impossible to build backends from
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field required by the selected backend is absent or empty
    #[error("{section}: missing required field `{field}`")]
    MissingField {
        section: &'static str,
        field: &'static str,
    },

    /// A field is present but outside its accepted range
    #[error("{section}: invalid `{field}`: {reason}")]
    InvalidValue {
        section: &'static str,
        field: &'static str,
        reason: String,
    },

    /// The backend refused to initialize from otherwise valid settings
    #[error("failed to initialize {backend} backend: {reason}")]
    Construction { backend: &'static str, reason: String },

    /// The settings file could not be read or parsed
    #[error("failed to load settings: {0}")]
    Load(String),
}

/// Failure that aborts a turn
#[derive(Error, Debug, Clone)]
pub enum TurnError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Speech recognition error: {0}")]
    Recognition(String),

    #[error("Dialogue error: {0}")]
    Dialogue(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("History error: {0}")]
    History(String),

    #[error("Audio capture error: {0}")]
    Capture(String),
}

impl TurnError {
    /// Whether the user has to change settings before retrying
    pub fn is_config_actionable(&self) -> bool {
        matches!(self, TurnError::Config(_))
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            TurnError::Config(e) => format!("Configuration error: {}. Please check settings.", e),
            TurnError::Recognition(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            TurnError::Dialogue(_) => "AI response generation failed. Please try again.".to_string(),
            TurnError::Synthesis(_) => {
                "Text-to-speech failed. The response is shown as text.".to_string()
            }
            TurnError::History(_) => "Could not save the conversation.".to_string(),
            TurnError::Capture(_) => {
                "Audio capture failed. Please check your microphone.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TurnError>;
