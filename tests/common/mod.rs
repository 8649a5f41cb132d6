//! Scripted backends and a fake audio monitor for driving the orchestrator

#![allow(dead_code)]

use async_trait::async_trait;
use murmur::audio::AudioMonitor;
use murmur::config::{DialogueSettings, RecognitionSettings, SynthesisSettings};
use murmur::{
    BackendFactory, DialogueClient, DialogueRequest, MessageStorage, Orchestrator,
    OrchestratorEvent, OrchestratorHandle, PlaybackHandle, RecordingMode, Settings,
    SettingsStore, SpeechRecognizer, SpeechSynthesizer, TurnState,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// What the fake backends answer
pub struct Script {
    pub transcript: Result<String, String>,
    pub response: Result<String, String>,
    pub synthesis_fails: bool,
    /// Held before recognition construction completes
    pub build_gate: Option<Arc<Notify>>,
    /// Held before the dialogue call returns
    pub dialogue_gate: Option<Arc<Notify>>,

    pub builds: AtomicUsize,
    pub recognitions: AtomicUsize,
    pub playbacks: AtomicUsize,
    pub requests: Mutex<Vec<DialogueRequest>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            transcript: Ok("hello".to_string()),
            response: Ok("hi there".to_string()),
            synthesis_fails: false,
            build_gate: None,
            dialogue_gate: None,
            builds: AtomicUsize::new(0),
            recognitions: AtomicUsize::new(0),
            playbacks: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl Script {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn playbacks(&self) -> usize {
        self.playbacks.load(Ordering::SeqCst)
    }

    pub fn recognitions(&self) -> usize {
        self.recognitions.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<DialogueRequest> {
        self.requests.lock().last().cloned()
    }
}

struct ScriptedBackend(Arc<Script>);

#[async_trait]
impl SpeechRecognizer for ScriptedBackend {
    async fn recognize(&self, samples: &[i16]) -> anyhow::Result<String> {
        assert!(!samples.is_empty());
        self.0.recognitions.fetch_add(1, Ordering::SeqCst);
        self.0.transcript.clone().map_err(anyhow::Error::msg)
    }
}

#[async_trait]
impl DialogueClient for ScriptedBackend {
    async fn send(&self, request: &DialogueRequest) -> anyhow::Result<String> {
        self.0.requests.lock().push(request.clone());
        if let Some(gate) = &self.0.dialogue_gate {
            gate.notified().await;
        }
        self.0.response.clone().map_err(anyhow::Error::msg)
    }
}

#[async_trait]
impl SpeechSynthesizer for ScriptedBackend {
    async fn speak(&self, _text: &str) -> anyhow::Result<Box<dyn PlaybackHandle>> {
        if self.0.synthesis_fails {
            anyhow::bail!("synthesis service unavailable");
        }
        Ok(Box::new(ScriptedPlayback(Arc::clone(&self.0))))
    }
}

struct ScriptedPlayback(Arc<Script>);

#[async_trait]
impl PlaybackHandle for ScriptedPlayback {
    async fn wait_for_completion(&mut self) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        self.0.playbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct ScriptedFactory(pub Arc<Script>);

#[async_trait]
impl BackendFactory for ScriptedFactory {
    async fn recognizer(
        &self,
        _settings: &RecognitionSettings,
    ) -> anyhow::Result<Arc<dyn SpeechRecognizer>> {
        self.0.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.0.build_gate {
            gate.notified().await;
        }
        Ok(Arc::new(ScriptedBackend(Arc::clone(&self.0))))
    }

    async fn dialogue(&self, _settings: &DialogueSettings) -> anyhow::Result<Arc<dyn DialogueClient>> {
        Ok(Arc::new(ScriptedBackend(Arc::clone(&self.0))))
    }

    async fn synthesizer(
        &self,
        _settings: &SynthesisSettings,
    ) -> anyhow::Result<Arc<dyn SpeechSynthesizer>> {
        Ok(Arc::new(ScriptedBackend(Arc::clone(&self.0))))
    }
}

#[derive(Default)]
pub struct MockMonitor {
    capturing: AtomicBool,
    /// Makes every `start_capture` fail while set
    pub fail_start: AtomicBool,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl MockMonitor {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// The detector ending a capture on its own
    pub fn end_capture(&self) {
        self.capturing.store(false, Ordering::SeqCst);
    }
}

impl AudioMonitor for MockMonitor {
    fn start_capture(&self) -> anyhow::Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            anyhow::bail!("input device unavailable");
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_capture(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.capturing.store(false, Ordering::SeqCst);
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn level(&self) -> f32 {
        0.25
    }
}

pub fn valid_settings(mode: RecordingMode) -> Settings {
    let mut settings = Settings::default().with_recording_mode(mode);
    settings.recognition.model_path = Some(PathBuf::from("/models/ggml-base.en.bin"));
    settings.dialogue.api_key = Some("sk-test".to_string());
    settings
}

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub handle: OrchestratorHandle,
    pub monitor: Arc<MockMonitor>,
    pub history: MessageStorage,
    pub settings: SettingsStore,
    pub script: Arc<Script>,
}

impl Harness {
    pub fn new(script: Script, settings: Settings) -> Self {
        let script = Arc::new(script);
        let monitor = Arc::new(MockMonitor::default());
        let history = MessageStorage::new();
        let settings = SettingsStore::new(settings);

        let (orchestrator, handle) = Orchestrator::new(
            Arc::new(ScriptedFactory(Arc::clone(&script))),
            settings.clone(),
            monitor.clone(),
            Arc::new(history.clone()),
        );

        Self {
            orchestrator,
            handle,
            monitor,
            history,
            settings,
            script,
        }
    }

    pub fn state(&self) -> TurnState {
        self.orchestrator.state()
    }

    pub fn events(&self) -> Vec<OrchestratorEvent> {
        std::iter::from_fn(|| self.handle.try_recv_event()).collect()
    }

    /// Poll until the orchestrator reaches `state`
    pub async fn wait_for_state(&self, state: TurnState) {
        for _ in 0..200 {
            if self.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {}, still {}", state, self.state());
    }
}
