//! Language detection worker client
//!
//! Owns the lazily spawned worker channel and the sync manager bound to it,
//! and brokers detection requests so a resource is always synchronized
//! before the worker classifies it.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──first request──► Active(channel, manager)
//!       │                                  │
//!       └────────────dispose()─────────────┴──► Disposed (terminal)
//! ```
//!
//! The channel and the manager are each created through a memoized future
//! (`tokio::sync::OnceCell`), so concurrent first callers share one creation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::DetectionBackend;
use crate::config::{ClientConfig, DetectionSettings};
use crate::documents::{resource_key, DocumentSource};
use crate::error::{DetectionError, DetectionResult};
use crate::language_ids::{LanguageIdMap, LanguageIdResolver};
use crate::metrics::{Metrics, MetricsSnapshot, TimingGuard};
use crate::sync::{ResourceSyncManager, SyncOptions, SyncedResourceInfo};
use crate::telemetry::{TelemetrySink, TracingTelemetry};
use crate::worker::{spawn_detection_worker, ClassifierLoader, WorkerHost};

/// Where a client is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    Active,
    Disposed,
}

/// Creates the worker behind a client's channel.
#[async_trait::async_trait]
pub trait WorkerFactory: Send + Sync {
    async fn create_worker(&self, host: WorkerHost) -> DetectionResult<Arc<dyn DetectionBackend>>;
}

/// Spawns the worker as a task on the current runtime.
pub struct InProcessWorkerFactory {
    loader: Arc<dyn ClassifierLoader>,
    settings: DetectionSettings,
}

impl InProcessWorkerFactory {
    pub fn new(loader: Arc<dyn ClassifierLoader>, settings: DetectionSettings) -> Self {
        Self { loader, settings }
    }
}

#[async_trait::async_trait]
impl WorkerFactory for InProcessWorkerFactory {
    async fn create_worker(&self, host: WorkerHost) -> DetectionResult<Arc<dyn DetectionBackend>> {
        Ok(Arc::new(spawn_detection_worker(host, self.loader.clone(), self.settings.clone())))
    }
}

pub struct LanguageDetectionWorkerClient {
    config: ClientConfig,
    documents: Arc<dyn DocumentSource>,
    factory: Arc<dyn WorkerFactory>,
    resolver: Arc<dyn LanguageIdResolver>,
    telemetry: Arc<dyn TelemetrySink>,
    metrics: Arc<Metrics>,
    channel: OnceCell<Arc<dyn DetectionBackend>>,
    manager: OnceCell<ResourceSyncManager>,
    disposed: AtomicBool,
}

impl LanguageDetectionWorkerClient {
    /// Creates an idle client. Nothing is spawned until the first request.
    pub fn new(config: ClientConfig, documents: Arc<dyn DocumentSource>, factory: Arc<dyn WorkerFactory>) -> Self {
        Self {
            config,
            documents,
            factory,
            resolver: Arc::new(LanguageIdMap::default()),
            telemetry: Arc::new(TracingTelemetry),
            metrics: Arc::new(Metrics::new()),
            channel: OnceCell::new(),
            manager: OnceCell::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn LanguageIdResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ClientState {
        if self.is_disposed() {
            ClientState::Disposed
        } else if self.channel.initialized() {
            ClientState::Active
        } else {
            ClientState::Uninitialized
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn metrics_registry(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Best editor language id for `resource`, or `None` when the worker has
    /// no confident guess or the guess maps to no editor language.
    pub async fn detect_language(&self, resource: &Url) -> DetectionResult<Option<String>> {
        let _timing = TimingGuard::new(self.metrics.clone(), "detect_language");
        let channel = self.synced_channel(resource).await?;
        let label = self.record(channel.detect_language(&resource_key(resource)).await)?;
        Ok(label.and_then(|label| self.resolver.resolve(&label)))
    }

    /// Ranked editor language ids for `resource`. Guesses that map to no
    /// editor language are dropped; the rest keep their order.
    pub async fn detect_languages(&self, resource: &Url) -> DetectionResult<Vec<String>> {
        let _timing = TimingGuard::new(self.metrics.clone(), "detect_languages");
        let channel = self.synced_channel(resource).await?;
        let guesses = self.record(channel.detect_languages(&resource_key(resource)).await)?;
        Ok(guesses
            .into_iter()
            .filter_map(|guess| self.resolver.resolve(&guess.label))
            .collect())
    }

    /// Currently mirrored resources. Empty before the first request.
    pub async fn synced_resources(&self) -> DetectionResult<Vec<SyncedResourceInfo>> {
        self.check_disposed()?;
        match self.manager.get() {
            Some(manager) => manager.synced_resources().await,
            None => Ok(Vec::new()),
        }
    }

    /// Evicts every mirror, then shuts the worker down. Later requests fail
    /// with [`DetectionError::Disposed`]. Idempotent.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Mirrors are removed while the worker can still receive the removals
        if let Some(manager) = self.manager.get() {
            let evicted = manager.dispose().await;
            debug!("Evicted {} mirrors on dispose", evicted);
        }
        if let Some(channel) = self.channel.get() {
            channel.shutdown();
        }
        info!("Language detection client '{}' disposed", self.config.label);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn check_disposed(&self) -> DetectionResult<()> {
        if self.is_disposed() {
            Err(DetectionError::Disposed)
        } else {
            Ok(())
        }
    }

    fn record<T>(&self, result: DetectionResult<T>) -> DetectionResult<T> {
        match &result {
            Ok(_) => self.metrics.record_detection(),
            Err(e) => {
                warn!("Language detection failed: {}", e);
                self.metrics.record_detection_failure();
            }
        }
        result
    }

    /// Synchronizes `resource` and returns the channel to query it on.
    async fn synced_channel(&self, resource: &Url) -> DetectionResult<Arc<dyn DetectionBackend>> {
        let manager = self.manager().await?;
        manager.ensure_synced(std::slice::from_ref(resource)).await?;
        self.channel().await
    }

    async fn channel(&self) -> DetectionResult<Arc<dyn DetectionBackend>> {
        self.check_disposed()?;
        let channel = self
            .channel
            .get_or_try_init(|| async move {
                debug!("Spawning language detection worker '{}'", self.config.label);
                let host = WorkerHost::new(self.config.label.clone(), self.config.assets.clone(), self.telemetry.clone());
                let channel = self.factory.create_worker(host).await?;
                self.metrics.record_worker_spawn();
                Ok::<_, DetectionError>(channel)
            })
            .await?
            .clone();

        // Disposal may have raced with creation
        if self.is_disposed() {
            channel.shutdown();
            return Err(DetectionError::Disposed);
        }
        Ok(channel)
    }

    async fn manager(&self) -> DetectionResult<&ResourceSyncManager> {
        self.check_disposed()?;
        let manager = self
            .manager
            .get_or_try_init(|| async move {
                let channel = self.channel().await?;
                let options = SyncOptions {
                    idle_eviction: self.config.idle_eviction,
                    idle_threshold: self.config.idle_threshold(),
                };
                self.metrics.record_manager_creation();
                Ok::<_, DetectionError>(ResourceSyncManager::spawn(
                    self.documents.clone(),
                    channel,
                    options,
                    self.metrics.clone(),
                ))
            })
            .await?;

        if self.is_disposed() {
            manager.dispose().await;
            return Err(DetectionError::Disposed);
        }
        Ok(manager)
    }
}

impl fmt::Debug for LanguageDetectionWorkerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageDetectionWorkerClient")
            .field("label", &self.config.label)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
