//! Configuration snapshot for the three backends and the conversation loop
//!
//! A `Settings` value is immutable once handed to the orchestrator. Either it
//! resolves to a full set of backends or validation names the field at fault.

mod store;

pub use store::SettingsStore;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a capture ends and whether the next one starts by itself
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMode {
    /// The user ends capture explicitly
    #[default]
    Manual,
    /// Capture ends on detected silence and resumes after each turn
    Auto,
}

/// Speech recognition backend variant
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionKind {
    /// Local whisper model
    #[default]
    Whisper,
    /// OpenAI transcription API
    OpenAi,
}

/// Dialogue backend variant
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueKind {
    /// OpenAI chat completions
    #[default]
    OpenAi,
    /// Ollama chat endpoint
    Ollama,
    /// Remote agent with a server-side prompt and fixed sampling
    HostedAgent,
}

impl DialogueKind {
    /// Whether a `system` message is honored by this backend
    pub fn supports_system_prompt(&self) -> bool {
        matches!(self, DialogueKind::OpenAi | DialogueKind::Ollama)
    }

    /// Whether temperature and nucleus sampling can be tuned per request
    pub fn supports_sampling(&self) -> bool {
        matches!(self, DialogueKind::OpenAi | DialogueKind::Ollama)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DialogueKind::OpenAi => "open_ai",
            DialogueKind::Ollama => "ollama",
            DialogueKind::HostedAgent => "hosted_agent",
        }
    }
}

/// Speech synthesis backend variant
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisKind {
    /// Platform speech synthesizer
    #[default]
    System,
    /// OpenAI speech API
    OpenAi,
}

/// Speech recognition settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    pub kind: RecognitionKind,
    pub model: String,
    /// Spoken language hint (ISO 639-1), auto-detect when absent
    pub language: Option<String>,
    pub model_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            kind: RecognitionKind::Whisper,
            model: "base.en".to_string(),
            language: None,
            model_path: None,
            api_key: None,
            endpoint: None,
        }
    }
}

impl RecognitionSettings {
    const SECTION: &'static str = "recognition";

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            RecognitionKind::Whisper => {
                let path = self.model_path.as_ref().filter(|p| !p.as_os_str().is_empty());
                if path.is_none() {
                    return Err(ConfigError::MissingField {
                        section: Self::SECTION,
                        field: "model_path",
                    });
                }
            }
            RecognitionKind::OpenAi => {
                require(&self.api_key, Self::SECTION, "api_key")?;
                require_str(&self.model, Self::SECTION, "model")?;
            }
        }
        Ok(())
    }
}

/// Dialogue model settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueSettings {
    pub kind: DialogueKind,
    pub model: String,
    pub system_prompt: String,
    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,
    /// Nucleus sampling probability
    pub top_p: f32,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            kind: DialogueKind::OpenAi,
            model: "gpt-4o-mini".to_string(),
            system_prompt: String::new(),
            temperature: 0.7,
            top_p: 0.9,
            api_key: None,
            endpoint: None,
        }
    }
}

impl DialogueSettings {
    const SECTION: &'static str = "dialogue";

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_str(&self.model, Self::SECTION, "model")?;

        match self.kind {
            DialogueKind::OpenAi => {
                require(&self.api_key, Self::SECTION, "api_key")?;
            }
            DialogueKind::Ollama => {
                require(&self.endpoint, Self::SECTION, "endpoint")?;
            }
            DialogueKind::HostedAgent => {
                require(&self.endpoint, Self::SECTION, "endpoint")?;
                require(&self.api_key, Self::SECTION, "api_key")?;
            }
        }

        if self.kind.supports_sampling() {
            if !(0.0..=2.0).contains(&self.temperature) {
                return Err(ConfigError::InvalidValue {
                    section: Self::SECTION,
                    field: "temperature",
                    reason: format!("{} is outside 0.0..=2.0", self.temperature),
                });
            }
            if !(0.0..=1.0).contains(&self.top_p) {
                return Err(ConfigError::InvalidValue {
                    section: Self::SECTION,
                    field: "top_p",
                    reason: format!("{} is outside 0.0..=1.0", self.top_p),
                });
            }
        }

        Ok(())
    }
}

/// Speech synthesis settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub kind: SynthesisKind,
    pub voice: Option<String>,
    pub api_key: Option<String>,
    /// Playback rate multiplier
    pub speed: f32,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            kind: SynthesisKind::System,
            voice: None,
            api_key: None,
            speed: 1.0,
        }
    }
}

impl SynthesisSettings {
    const SECTION: &'static str = "synthesis";

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ConfigError::InvalidValue {
                section: Self::SECTION,
                field: "speed",
                reason: format!("{} must be a positive number", self.speed),
            });
        }
        if self.kind == SynthesisKind::OpenAi {
            require(&self.api_key, Self::SECTION, "api_key")?;
        }
        Ok(())
    }
}

/// Turn-loop settings shared by all backends
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    pub recording_mode: RecordingMode,
    /// Number of most recent persisted messages sent to the dialogue backend
    pub context_window: usize,
    /// Write each captured utterance here as a WAV file
    pub capture_dump_dir: Option<PathBuf>,
    /// Sample rate of captured audio
    pub sample_rate: u32,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            recording_mode: RecordingMode::Manual,
            context_window: 5,
            capture_dump_dir: None,
            sample_rate: 16000,
        }
    }
}

impl ConversationSettings {
    const SECTION: &'static str = "conversation";

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context_window == 0 {
            return Err(ConfigError::InvalidValue {
                section: Self::SECTION,
                field: "context_window",
                reason: "must keep at least one message".to_string(),
            });
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                section: Self::SECTION,
                field: "sample_rate",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Complete configuration snapshot
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub recognition: RecognitionSettings,
    pub dialogue: DialogueSettings,
    pub synthesis: SynthesisSettings,
    pub conversation: ConversationSettings,
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let settings = Self::from_toml_str(&content)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// `<config dir>/murmur/settings.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("murmur").join("settings.toml"))
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.conversation.validate()?;
        self.recognition.validate()?;
        self.dialogue.validate()?;
        self.synthesis.validate()
    }

    /// Digest identifying this exact snapshot
    pub fn fingerprint(&self) -> Fingerprint {
        // Plain data with string keys always serializes.
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        Fingerprint(Sha256::digest(&encoded).into())
    }

    pub fn recording_mode(&self) -> RecordingMode {
        self.conversation.recording_mode
    }

    /// Set the recording mode
    pub fn with_recording_mode(mut self, mode: RecordingMode) -> Self {
        self.conversation.recording_mode = mode;
        self
    }

    /// Set the dialogue settings
    pub fn with_dialogue(mut self, dialogue: DialogueSettings) -> Self {
        self.dialogue = dialogue;
        self
    }

    /// Set the recognition settings
    pub fn with_recognition(mut self, recognition: RecognitionSettings) -> Self {
        self.recognition = recognition;
        self
    }

    /// Set the synthesis settings
    pub fn with_synthesis(mut self, synthesis: SynthesisSettings) -> Self {
        self.synthesis = synthesis;
        self
    }
}

/// SHA-256 digest of a settings snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

fn require<'a>(
    value: &'a Option<String>,
    section: &'static str,
    field: &'static str,
) -> Result<&'a str, ConfigError> {
    match value.as_deref() {
        Some(v) => require_str(v, section, field),
        None => Err(ConfigError::MissingField { section, field }),
    }
}

fn require_str<'a>(
    value: &'a str,
    section: &'static str,
    field: &'static str,
) -> Result<&'a str, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ConfigError::MissingField { section, field })
    } else {
        Ok(trimmed)
    }
}
