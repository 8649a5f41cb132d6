//! Orchestrator for one spoken conversation turn
//!
//! Drives capture -> STT -> dialogue -> TTS -> playback and returns to
//! listening (auto mode) or idle. At most one turn is in flight; every
//! failure ends the turn in `Idle` and is reported on the event channel.

use crate::audio::{dump_capture, AudioMonitor};
use crate::config::{RecordingMode, Settings, SettingsStore};
use crate::error::{Result, TurnError};
use crate::integration::state::{OrchestratorEvent, TurnState};
use crate::llm::ContextAssembler;
use crate::messages::{HistoryStore, Role};
use crate::services::{BackendFactory, ServiceRegistry, Services};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const EVENT_BUFFER_SIZE: usize = 100;

/// Services and settings a turn was started with
///
/// A settings change during `Processing` does not touch these; the turn
/// finishes against them.
#[derive(Clone)]
struct ActiveTurn {
    services: Services,
    settings: Settings,
    epoch: u64,
}

struct TurnControl {
    state: TurnState,
    /// Bumped on every settings change
    epoch: u64,
    active: Option<ActiveTurn>,
}

/// Handle for the presentation layer
///
/// Exposes the single `begin_turn` trigger, state reads, the input level and
/// the event channel.
#[derive(Clone)]
pub struct OrchestratorHandle {
    orchestrator: Arc<Orchestrator>,
    event_rx: Receiver<OrchestratorEvent>,
}

impl OrchestratorHandle {
    /// Start a turn, or end capture if already listening
    pub async fn begin_turn(&self) -> Result<()> {
        self.orchestrator.begin_turn().await
    }

    pub fn state(&self) -> TurnState {
        self.orchestrator.state()
    }

    /// Check if capture is active
    pub fn is_listening(&self) -> bool {
        self.state().is_listening()
    }

    /// Check if a turn is being set up or processed
    pub fn is_responding(&self) -> bool {
        self.state().is_responding()
    }

    /// Input level passthrough for the UI meter
    pub fn audio_level(&self) -> f32 {
        self.orchestrator.monitor.level()
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<OrchestratorEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Get the event receiver
    pub fn event_receiver(&self) -> Receiver<OrchestratorEvent> {
        self.event_rx.clone()
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}

/// The turn state machine
pub struct Orchestrator {
    registry: ServiceRegistry,
    settings: SettingsStore,
    monitor: Arc<dyn AudioMonitor>,
    history: Arc<dyn HistoryStore>,
    turn: Mutex<TurnControl>,
    event_tx: Sender<OrchestratorEvent>,
}

impl Orchestrator {
    /// Create an orchestrator in `Idle`
    ///
    /// Backends are not built until the first `begin_turn`.
    pub fn new(
        factory: Arc<dyn BackendFactory>,
        settings: SettingsStore,
        monitor: Arc<dyn AudioMonitor>,
        history: Arc<dyn HistoryStore>,
    ) -> (Arc<Self>, OrchestratorHandle) {
        let (event_tx, event_rx) = bounded(EVENT_BUFFER_SIZE);

        let orchestrator = Arc::new(Self {
            registry: ServiceRegistry::new(factory),
            settings,
            monitor,
            history,
            turn: Mutex::new(TurnControl {
                state: TurnState::Idle,
                epoch: 0,
                active: None,
            }),
            event_tx,
        });

        let handle = OrchestratorHandle {
            orchestrator: Arc::clone(&orchestrator),
            event_rx,
        };

        (orchestrator, handle)
    }

    pub fn state(&self) -> TurnState {
        self.turn.lock().state
    }

    /// Whether a turn currently holds backend handles
    pub fn has_active_turn(&self) -> bool {
        self.turn.lock().active.is_some()
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Presentation trigger
    ///
    /// From `Idle`: validate/build services, then start capture. From
    /// `Listening`: stop capture so the monitor delivers the buffer, or
    /// restart it if the monitor already stopped. While responding: ignored,
    /// nothing is queued.
    pub async fn begin_turn(&self) -> Result<()> {
        let epoch = {
            let mut turn = self.turn.lock();
            match turn.state {
                TurnState::Idle => {}
                TurnState::Listening => {
                    if self.monitor.is_capturing() {
                        debug!("Ending capture on user request");
                        self.monitor.stop_capture();
                        return Ok(());
                    }
                    info!("Listening without an active capture, restarting it");
                    return self.resume_capture(&mut turn);
                }
                TurnState::AwaitingServices | TurnState::Processing => {
                    debug!("Turn already in flight ({}), ignoring trigger", turn.state);
                    return Ok(());
                }
            }
            self.set_state(&mut turn, TurnState::AwaitingServices);
            turn.epoch
        };

        let settings = self.settings.snapshot();
        let built = self.registry.ensure_valid(&settings).await;

        let mut turn = self.turn.lock();
        let services = match built {
            Ok(services) => services,
            Err(e) => {
                self.enter_idle(&mut turn);
                return Err(self.report(TurnError::Config(e)));
            }
        };

        if turn.epoch != epoch {
            info!("Settings changed while initializing services, not starting capture");
            self.enter_idle(&mut turn);
            return Ok(());
        }

        if let Err(e) = self.monitor.start_capture() {
            self.enter_idle(&mut turn);
            return Err(self.report(TurnError::Capture(format!("{:#}", e))));
        }

        turn.active = Some(ActiveTurn {
            services,
            settings,
            epoch,
        });
        self.set_state(&mut turn, TurnState::Listening);
        Ok(())
    }

    /// Finished buffer from the audio monitor
    ///
    /// Runs the whole pipeline when listening. An empty or absent buffer ends
    /// a capture without speech; capture is restarted and the orchestrator
    /// keeps listening.
    pub async fn speech_captured(&self, samples: Option<Vec<i16>>) -> Result<()> {
        let (active, samples) = {
            let mut turn = self.turn.lock();
            if !turn.state.is_listening() {
                debug!("Captured audio arrived while {}, dropping it", turn.state);
                return Ok(());
            }

            let samples = match samples {
                Some(samples) if !samples.is_empty() => samples,
                _ => {
                    info!("No speech detected, still listening");
                    if self.monitor.is_capturing() {
                        return Ok(());
                    }
                    return self.resume_capture(&mut turn);
                }
            };

            let Some(active) = turn.active.clone() else {
                warn!("Listening without services, returning to idle");
                self.enter_idle(&mut turn);
                return Ok(());
            };

            self.set_state(&mut turn, TurnState::Processing);
            (active, samples)
        };

        if active.settings.recording_mode() == RecordingMode::Auto && self.monitor.is_capturing() {
            self.monitor.stop_capture();
        }

        let outcome = self.run_pipeline(&active, &samples).await;

        let mut turn = self.turn.lock();
        match outcome {
            Ok(()) => {
                let resume = active.settings.recording_mode() == RecordingMode::Auto
                    && turn.epoch == active.epoch;
                if !resume {
                    self.enter_idle(&mut turn);
                    return Ok(());
                }

                self.resume_capture(&mut turn)?;
                self.set_state(&mut turn, TurnState::Listening);
                Ok(())
            }
            Err(e) => {
                self.enter_idle(&mut turn);
                Err(self.report(e))
            }
        }
    }

    /// Apply a settings change
    ///
    /// Always invalidates the registry. Outside `Processing` it also stops
    /// capture and returns to `Idle`; an in-flight turn finishes against its
    /// old services and does not auto-resume.
    pub fn configuration_changed(&self) {
        self.registry.invalidate();

        let mut turn = self.turn.lock();
        turn.epoch += 1;

        match turn.state {
            TurnState::Processing => {
                info!("Settings changed mid-turn, applying after the current turn");
            }
            TurnState::AwaitingServices => {
                info!("Settings changed while initializing services");
            }
            TurnState::Idle | TurnState::Listening => {
                if self.monitor.is_capturing() {
                    self.monitor.stop_capture();
                }
                self.enter_idle(&mut turn);
            }
        }
    }

    /// Feed finished buffers from the monitor until the sender closes
    pub async fn run_capture_events(self: Arc<Self>, mut rx: mpsc::Receiver<Option<Vec<i16>>>) {
        while let Some(samples) = rx.recv().await {
            // Failures are already reported on the event channel.
            let _ = self.speech_captured(samples).await;
        }
        debug!("Capture event stream closed");
    }

    /// Apply every settings change published by the store
    pub async fn watch_settings(self: Arc<Self>) {
        let mut rx = self.settings.subscribe();
        while rx.changed().await.is_ok() {
            rx.borrow_and_update();
            self.configuration_changed();
        }
    }

    async fn run_pipeline(&self, active: &ActiveTurn, samples: &[i16]) -> Result<()> {
        let settings = &active.settings;
        let services = &active.services;

        if let Some(dir) = &settings.conversation.capture_dump_dir {
            if let Err(e) = dump_capture(dir, samples, settings.conversation.sample_rate) {
                warn!("Failed to dump capture: {:#}", e);
            }
        }

        debug!("Recognizing {} samples", samples.len());
        let transcript = services
            .recognizer
            .recognize(samples)
            .await
            .map_err(|e| TurnError::Recognition(format!("{:#}", e)))?;
        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(TurnError::Recognition("no speech recognized".to_string()));
        }
        info!("Transcription: {}", transcript);
        self.emit(OrchestratorEvent::Transcription(transcript.clone()));

        self.history
            .append(&transcript, Role::User)
            .await
            .map_err(|e| TurnError::History(format!("{:#}", e)))?;

        let recent = self
            .history
            .recent(settings.conversation.context_window)
            .await
            .map_err(|e| TurnError::History(format!("{:#}", e)))?;
        let request = ContextAssembler::build_request(&recent, &settings.dialogue);
        debug!(
            "Sending {} messages to {}",
            request.messages.len(),
            request.model
        );

        let response = services
            .dialogue
            .send(&request)
            .await
            .map_err(|e| TurnError::Dialogue(format!("{:#}", e)))?;
        info!("Response: {} chars", response.len());
        self.emit(OrchestratorEvent::Response(response.clone()));

        self.history
            .append(&response, Role::Assistant)
            .await
            .map_err(|e| TurnError::History(format!("{:#}", e)))?;

        let mut playback = services
            .synthesizer
            .speak(&response)
            .await
            .map_err(|e| TurnError::Synthesis(format!("{:#}", e)))?;
        playback
            .wait_for_completion()
            .await
            .map_err(|e| TurnError::Synthesis(format!("{:#}", e)))?;
        self.emit(OrchestratorEvent::PlaybackComplete);

        Ok(())
    }

    /// Start the monitor again for the current turn, or fall back to `Idle`
    fn resume_capture(&self, turn: &mut TurnControl) -> Result<()> {
        if let Err(e) = self.monitor.start_capture() {
            self.enter_idle(turn);
            return Err(self.report(TurnError::Capture(format!("{:#}", e))));
        }
        Ok(())
    }

    /// Idle holds no services; the next turn asks the registry again
    fn enter_idle(&self, turn: &mut TurnControl) {
        turn.active = None;
        self.set_state(turn, TurnState::Idle);
    }

    fn set_state(&self, turn: &mut TurnControl, state: TurnState) {
        if turn.state == state {
            return;
        }
        debug!("Turn state {} -> {}", turn.state, state);
        turn.state = state;
        self.emit(OrchestratorEvent::StateChanged(state));
    }

    fn report(&self, err: TurnError) -> TurnError {
        error!("Turn failed: {}", err);
        self.emit(OrchestratorEvent::Error {
            message: err.user_message(),
            config_actionable: err.is_config_actionable(),
        });
        err
    }

    fn emit(&self, event: OrchestratorEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => debug!("Event channel full, dropping {:?}", event),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
