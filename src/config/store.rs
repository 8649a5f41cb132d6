use super::Settings;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Current settings plus change notification
///
/// Readers take cheap snapshots; the orchestrator subscribes to learn when
/// its backends have gone stale.
#[derive(Clone)]
pub struct SettingsStore {
    tx: Arc<watch::Sender<Settings>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self { tx: Arc::new(tx) }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> Settings {
        self.tx.borrow().clone()
    }

    /// Replace the settings, notifying subscribers only if something changed
    pub fn update(&self, settings: Settings) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == settings {
                false
            } else {
                *current = settings;
                true
            }
        });
        if changed {
            info!("Settings updated");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordingMode;

    #[test]
    fn test_update_unchanged_is_silent() {
        let store = SettingsStore::default();
        let rx = store.subscribe();
        assert!(!store.update(Settings::default()));
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_update_notifies_subscribers() {
        let store = SettingsStore::default();
        let mut rx = store.subscribe();

        let changed = store.update(Settings::default().with_recording_mode(RecordingMode::Auto));
        assert!(changed);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().recording_mode(), RecordingMode::Auto);
        assert_eq!(store.snapshot().recording_mode(), RecordingMode::Auto);
    }
}
