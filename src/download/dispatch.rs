//! Provider gate and URL routing.
//!
//! Every provider call goes through a [`ProviderGate`]: a per-provider semaphore
//! bounds concurrency, each attempt runs under a timeout and transient failures
//! are retried a fixed number of times.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

use crate::core::config;
use crate::core::retry::{retry, RetryConfig};
use crate::core::types::ProviderKind;
use crate::download::provider::{MaterializeRequest, MaterializedMedia, MediaProvider, ProbeResult, ProviderError};
use crate::download::source::ytdlp::YtDlpProvider;

/// Limits applied to one provider.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub concurrency: usize,
    pub probe_timeout: Duration,
    pub download_timeout: Duration,
    pub retry: RetryConfig,
}

impl GateConfig {
    pub fn from_env() -> Self {
        Self {
            concurrency: *config::provider::CONCURRENCY,
            probe_timeout: config::provider::probe_timeout(),
            download_timeout: config::provider::download_timeout(),
            retry: RetryConfig::provider(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            concurrency: config::provider::DEFAULT_CONCURRENCY,
            probe_timeout: Duration::from_secs(config::provider::PROBE_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(config::provider::DOWNLOAD_TIMEOUT_SECS),
            retry: RetryConfig::provider(),
        }
    }
}

pub struct ProviderGate {
    provider: Arc<dyn MediaProvider>,
    permits: Arc<Semaphore>,
    config: GateConfig,
}

impl ProviderGate {
    pub fn new(provider: Arc<dyn MediaProvider>, config: GateConfig) -> Self {
        Self {
            provider,
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            config,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn supports_url(&self, url: &Url) -> bool {
        self.provider.supports_url(url)
    }

    pub async fn probe(&self, url: &Url) -> Result<ProbeResult, ProviderError> {
        self.call("probe", self.config.probe_timeout, || self.provider.probe(url))
            .await
    }

    pub async fn materialize(&self, request: &MaterializeRequest) -> Result<MaterializedMedia, ProviderError> {
        self.call("materialize", self.config.download_timeout, || {
            self.provider.materialize(request)
        })
        .await
    }

    async fn call<T, F, Fut>(&self, op_name: &str, timeout: Duration, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::Failed("provider gate closed".to_string()))?;

        let outcome = retry(&self.config.retry, || {
            let attempt = op();
            async move {
                match tokio::time::timeout(timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Transient(format!(
                        "timed out after {}s",
                        timeout.as_secs()
                    ))),
                }
            }
        })
        .await;

        if outcome.attempts > 1 {
            log::info!(
                "{} {} finished after {} attempts in {:?}",
                self.kind(),
                op_name,
                outcome.attempts,
                outcome.total_duration
            );
        }
        outcome.into_result()
    }
}

/// Routes URLs and provider kinds to their gate.
pub struct ProviderRegistry {
    gates: Vec<ProviderGate>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { gates: Vec::new() }
    }

    /// Registers a provider. Providers are tried in insertion order.
    pub fn register(&mut self, provider: Arc<dyn MediaProvider>, config: GateConfig) {
        self.gates.push(ProviderGate::new(provider, config));
    }

    /// First gate whose provider claims the URL.
    pub fn resolve(&self, url: &Url) -> Option<&ProviderGate> {
        self.gates.iter().find(|g| g.supports_url(url))
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderGate> {
        self.gates.iter().find(|g| g.kind() == kind)
    }

    /// yt-dlp backed providers for every supported service.
    pub fn default_registry() -> Self {
        let mut registry = Self::new();
        for kind in ProviderKind::ALL {
            registry.register(Arc::new(YtDlpProvider::new(kind)), GateConfig::from_env());
        }
        registry
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        calls: AtomicU32,
        fail_times: u32,
        delay: Duration,
    }

    #[async_trait]
    impl MediaProvider for Flaky {
        fn kind(&self) -> ProviderKind {
            ProviderKind::TikTok
        }

        fn supports_url(&self, url: &Url) -> bool {
            url.host_str() == Some("www.tiktok.com")
        }

        async fn probe(&self, _url: &Url) -> Result<ProbeResult, ProviderError> {
            Err(ProviderError::Failed("not used".to_string()))
        }

        async fn materialize(&self, request: &MaterializeRequest) -> Result<MaterializedMedia, ProviderError> {
            tokio::time::sleep(self.delay).await;
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_times {
                return Err(ProviderError::Transient("reset".to_string()));
            }
            Ok(MaterializedMedia {
                path: request.output_dir.join(&request.file_stem),
            })
        }
    }

    fn request() -> MaterializeRequest {
        MaterializeRequest {
            url: "https://www.tiktok.com/@a/video/1".to_string(),
            provider_video_id: "1".to_string(),
            format_id: "h264".to_string(),
            kind: crate::core::types::FormatKind::Video,
            output_dir: std::env::temp_dir(),
            file_stem: "clip".to_string(),
        }
    }

    fn fast_config() -> GateConfig {
        GateConfig {
            concurrency: 1,
            probe_timeout: Duration::from_millis(200),
            download_timeout: Duration::from_millis(200),
            retry: RetryConfig::new()
                .max_retries(2)
                .initial_delay(Duration::from_millis(5))
                .no_jitter(),
        }
    }

    #[tokio::test]
    async fn test_gate_retries_transient() {
        let provider = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_times: 2,
            delay: Duration::ZERO,
        });
        let gate = ProviderGate::new(provider.clone(), fast_config());

        assert!(gate.materialize(&request()).await.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gate_timeout_is_transient() {
        let provider = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            fail_times: 0,
            delay: Duration::from_secs(5),
        });
        let mut config = fast_config();
        config.retry = config.retry.max_retries(0);
        let gate = ProviderGate::new(provider, config);

        let err = gate.materialize(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transient(_)));
    }

    #[test]
    fn test_registry_routes_by_url_and_kind() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            Arc::new(Flaky {
                calls: AtomicU32::new(0),
                fail_times: 0,
                delay: Duration::ZERO,
            }),
            fast_config(),
        );

        let url = Url::parse("https://www.tiktok.com/@a/video/1").unwrap();
        assert!(registry.resolve(&url).is_some());
        assert!(registry.resolve(&Url::parse("https://example.com/").unwrap()).is_none());
        assert!(registry.get(ProviderKind::TikTok).is_some());
        assert!(registry.get(ProviderKind::Vk).is_none());
    }
}
