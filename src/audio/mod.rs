//! Audio capture contract and capture dumps
//!
//! The monitor owns the microphone and decides when speech begins and ends.
//! The orchestrator only toggles it and receives the finished buffer.

pub mod wav;

pub use wav::dump_capture;

/// Microphone capture with level metering and end-of-speech detection
///
/// Finished buffers are delivered separately (see
/// `Orchestrator::run_capture_events`): exactly once per completed capture,
/// or `None`/empty when no speech was detected.
pub trait AudioMonitor: Send + Sync {
    fn start_capture(&self) -> anyhow::Result<()>;

    fn stop_capture(&self);

    fn is_capturing(&self) -> bool;

    /// Instantaneous input level in 0.0..=1.0, for display only
    fn level(&self) -> f32;
}
