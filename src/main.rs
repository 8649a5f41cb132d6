use anyhow::{Context, Result};
use murmur::Settings;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Validate a settings file and print its fingerprint
///
/// Usage: `murmur [SETTINGS.toml]`, defaulting to the platform config dir.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = match std::env::args_os().nth(1) {
        Some(arg) => arg.into(),
        None => Settings::default_path().context("No config directory on this platform")?,
    };

    info!("Checking settings at {}", path.display());
    let settings = Settings::load(&path)?;

    if let Err(e) = settings.validate() {
        warn!("Settings are not usable: {}", e);
        return Err(e.into());
    }

    info!(
        "Settings OK: recognition={:?} dialogue={} synthesis={:?} mode={:?}",
        settings.recognition.kind,
        settings.dialogue.kind.as_str(),
        settings.synthesis.kind,
        settings.recording_mode()
    );
    println!("{}", settings.fingerprint());
    Ok(())
}
