use super::{BackendFactory, DialogueClient, SpeechRecognizer, SpeechSynthesizer};
use crate::config::{Fingerprint, Settings};
use crate::error::ConfigError;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The three backends a turn runs against
///
/// Always built and replaced together so a turn never mixes backends from
/// different settings.
#[derive(Clone)]
pub struct Services {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub dialogue: Arc<dyn DialogueClient>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

#[derive(Default)]
struct RegistryInner {
    /// Settings the current services were built from; `None` means stale
    fingerprint: Option<Fingerprint>,
    services: Option<Services>,
    /// Bumped by `invalidate` so a build racing with it is not marked fresh
    generation: u64,
}

/// Lazily (re)built backend triple keyed by settings fingerprint
pub struct ServiceRegistry {
    factory: Arc<dyn BackendFactory>,
    inner: Mutex<RegistryInner>,
}

impl ServiceRegistry {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Make sure services built from `settings` are available
    ///
    /// Returns the cached triple when the fingerprint matches. Otherwise builds
    /// recognition, dialogue and synthesis in that order; any failure empties
    /// the registry.
    ///
    /// Not reentrant: callers must not run two of these concurrently.
    pub async fn ensure_valid(&self, settings: &Settings) -> Result<Services, ConfigError> {
        let fingerprint = settings.fingerprint();

        let generation = {
            let inner = self.inner.lock();
            if inner.fingerprint == Some(fingerprint) {
                if let Some(services) = &inner.services {
                    debug!("Services up to date ({})", fingerprint);
                    return Ok(services.clone());
                }
            }
            inner.generation
        };

        info!("Building services for settings {}", fingerprint);

        match self.build(settings).await {
            Ok(services) => {
                let mut inner = self.inner.lock();
                inner.services = Some(services.clone());
                if inner.generation == generation {
                    inner.fingerprint = Some(fingerprint);
                } else {
                    debug!("Registry invalidated during build, leaving it stale");
                    inner.fingerprint = None;
                }
                info!("Services ready");
                Ok(services)
            }
            Err(e) => {
                let mut inner = self.inner.lock();
                inner.services = None;
                inner.fingerprint = None;
                warn!("Service initialization failed: {}", e);
                Err(e)
            }
        }
    }

    /// Force the next `ensure_valid` to rebuild
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock();
        inner.fingerprint = None;
        inner.generation += 1;
        debug!("Service registry invalidated");
    }

    /// Whether cached services match `settings`
    pub fn is_valid_for(&self, settings: &Settings) -> bool {
        let inner = self.inner.lock();
        inner.services.is_some() && inner.fingerprint == Some(settings.fingerprint())
    }

    pub fn has_services(&self) -> bool {
        self.inner.lock().services.is_some()
    }

    async fn build(&self, settings: &Settings) -> Result<Services, ConfigError> {
        settings.conversation.validate()?;

        settings.recognition.validate()?;
        let recognizer = self
            .factory
            .recognizer(&settings.recognition)
            .await
            .map_err(|e| construction("recognition", e))?;
        debug!("Recognizer ready ({:?})", settings.recognition.kind);

        settings.dialogue.validate()?;
        let dialogue = self
            .factory
            .dialogue(&settings.dialogue)
            .await
            .map_err(|e| construction("dialogue", e))?;
        debug!("Dialogue client ready ({})", settings.dialogue.kind.as_str());

        settings.synthesis.validate()?;
        let synthesizer = self
            .factory
            .synthesizer(&settings.synthesis)
            .await
            .map_err(|e| construction("synthesis", e))?;
        debug!("Synthesizer ready ({:?})", settings.synthesis.kind);

        Ok(Services {
            recognizer,
            dialogue,
            synthesizer,
        })
    }
}

fn construction(backend: &'static str, error: anyhow::Error) -> ConfigError {
    ConfigError::Construction {
        backend,
        reason: format!("{:#}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DialogueSettings, RecognitionSettings, SynthesisSettings};
    use crate::llm::DialogueRequest;
    use crate::services::PlaybackHandle;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Nothing;

    #[async_trait]
    impl SpeechRecognizer for Nothing {
        async fn recognize(&self, _samples: &[i16]) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    #[async_trait]
    impl DialogueClient for Nothing {
        async fn send(&self, _request: &DialogueRequest) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for Nothing {
        async fn speak(&self, _text: &str) -> anyhow::Result<Box<dyn PlaybackHandle>> {
            anyhow::bail!("silent")
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
        fail_synthesis: bool,
    }

    #[async_trait]
    impl BackendFactory for CountingFactory {
        async fn recognizer(
            &self,
            _settings: &RecognitionSettings,
        ) -> anyhow::Result<Arc<dyn SpeechRecognizer>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Nothing))
        }

        async fn dialogue(
            &self,
            _settings: &DialogueSettings,
        ) -> anyhow::Result<Arc<dyn DialogueClient>> {
            Ok(Arc::new(Nothing))
        }

        async fn synthesizer(
            &self,
            _settings: &SynthesisSettings,
        ) -> anyhow::Result<Arc<dyn SpeechSynthesizer>> {
            if self.fail_synthesis {
                anyhow::bail!("voice not installed");
            }
            Ok(Arc::new(Nothing))
        }
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.recognition.model_path = Some(PathBuf::from("/models/base.bin"));
        settings.dialogue.api_key = Some("sk-test".to_string());
        settings
    }

    #[tokio::test]
    async fn test_builds_once_per_fingerprint() {
        let factory = Arc::new(CountingFactory::default());
        let registry = ServiceRegistry::new(factory.clone());

        registry.ensure_valid(&settings()).await.unwrap();
        registry.ensure_valid(&settings()).await.unwrap();

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert!(registry.is_valid_for(&settings()));
    }

    #[tokio::test]
    async fn test_settings_change_rebuilds() {
        let factory = Arc::new(CountingFactory::default());
        let registry = ServiceRegistry::new(factory.clone());
        registry.ensure_valid(&settings()).await.unwrap();

        let mut changed = settings();
        changed.dialogue.model = "gpt-4o".to_string();
        assert!(!registry.is_valid_for(&changed));

        registry.ensure_valid(&changed).await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let factory = Arc::new(CountingFactory::default());
        let registry = ServiceRegistry::new(factory.clone());
        registry.ensure_valid(&settings()).await.unwrap();

        registry.invalidate();
        assert!(registry.has_services());
        assert!(!registry.is_valid_for(&settings()));

        registry.ensure_valid(&settings()).await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_field_leaves_registry_empty() {
        let registry = ServiceRegistry::new(Arc::new(CountingFactory::default()));
        registry.ensure_valid(&settings()).await.unwrap();

        let mut broken = settings();
        broken.dialogue.api_key = None;
        let result = registry.ensure_valid(&broken).await;

        assert!(matches!(result, Err(ConfigError::MissingField { field: "api_key", .. })));
        assert!(!registry.has_services());
        assert!(!registry.is_valid_for(&settings()));
    }

    #[tokio::test]
    async fn test_construction_failure_rolls_back() {
        let factory = Arc::new(CountingFactory {
            fail_synthesis: true,
            ..Default::default()
        });
        let registry = ServiceRegistry::new(factory);

        let result = registry.ensure_valid(&settings()).await;
        match result {
            Err(ConfigError::Construction { backend, reason }) => {
                assert_eq!(backend, "synthesis");
                assert!(reason.contains("voice not installed"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected failure"),
        }
        assert!(!registry.has_services());
    }
}
