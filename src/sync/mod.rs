//! Resource synchronization manager
//!
//! Decides which documents are mirrored in the detection backend, forwards
//! their edits, and drops mirrors that are disposed or go unused.
//!
//! # Architecture
//!
//! ```text
//! ensure_synced ─┐
//! dispose ───────┼─► command channel ─┐
//!                                      ├─► SyncActor ──► DetectionBackend
//! document events (per mirror) ────────┤     owns SyncedResourceTable
//! idle sweep tick (threshold / 2) ─────┘
//! ```
//!
//! The table has exactly one writer: the actor task. Commands, document
//! events and sweep ticks are serialized through one `select!` loop, so no
//! lock guards the table and every backend notification for a resource is
//! issued from the same task, in order.

mod subscription;
mod table;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace, warn};
use url::Url;

use crate::backend::DetectionBackend;
use crate::documents::{resource_key, DocumentSource};
use crate::error::{DetectionError, DetectionResult};
use crate::metrics::{EvictionReason, Metrics};

use subscription::{SubscriptionEvent, SubscriptionGroup};
pub use table::SyncedResourceInfo;
use table::{SyncedResource, SyncedResourceTable};

/// How the manager decides when to stop mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// When false, mirrors live until their document is disposed or the
    /// manager is disposed, and no timer runs.
    pub idle_eviction: bool,
    pub idle_threshold: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            idle_eviction: true,
            idle_threshold: Duration::from_millis(crate::config::DEFAULT_IDLE_THRESHOLD_MS),
        }
    }
}

#[derive(Debug)]
enum SyncCommand {
    EnsureSynced {
        resources: Vec<Url>,
        reply: oneshot::Sender<()>,
    },
    Inspect {
        reply: oneshot::Sender<Vec<SyncedResourceInfo>>,
    },
    Dispose {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the sync actor
///
/// Dropping the handle stops the actor, which evicts every remaining mirror.
#[derive(Debug)]
pub struct ResourceSyncManager {
    commands: mpsc::UnboundedSender<SyncCommand>,
}

impl ResourceSyncManager {
    /// Spawns the sync actor on the current runtime.
    pub fn spawn(
        documents: Arc<dyn DocumentSource>,
        backend: Arc<dyn DetectionBackend>,
        options: SyncOptions,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let actor = SyncActor {
            commands: rx,
            documents,
            backend,
            options,
            metrics,
            table: SyncedResourceTable::default(),
        };
        tokio::spawn(actor.run());
        Self { commands }
    }

    /// Makes sure each resource is mirrored (when it can be) and marks it as
    /// used now. When this returns, the backend has been sent the snapshot of
    /// every newly mirrored resource and every queued edit of already
    /// mirrored ones.
    ///
    /// Documents that are gone or too large are skipped silently. The only
    /// error is [`DetectionError::Disposed`].
    pub async fn ensure_synced(&self, resources: &[Url]) -> DetectionResult<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SyncCommand::EnsureSynced {
                resources: resources.to_vec(),
                reply,
            })
            .map_err(|_| DetectionError::Disposed)?;
        rx.await.map_err(|_| DetectionError::Disposed)
    }

    /// Lists the currently mirrored resources.
    pub async fn synced_resources(&self) -> DetectionResult<Vec<SyncedResourceInfo>> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SyncCommand::Inspect { reply })
            .map_err(|_| DetectionError::Disposed)?;
        rx.await.map_err(|_| DetectionError::Disposed)
    }

    /// Evicts every mirror and stops the actor. Returns how many mirrors were
    /// evicted; repeated calls return 0.
    pub async fn dispose(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(SyncCommand::Dispose { reply }).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub fn is_disposed(&self) -> bool {
        self.commands.is_closed()
    }
}

struct SyncActor {
    commands: mpsc::UnboundedReceiver<SyncCommand>,
    documents: Arc<dyn DocumentSource>,
    backend: Arc<dyn DetectionBackend>,
    options: SyncOptions,
    metrics: Arc<Metrics>,
    table: SyncedResourceTable,
}

impl SyncActor {
    async fn run(mut self) {
        let mut sweep = self.options.idle_eviction.then(|| {
            let period = (self.options.idle_threshold / 2).max(Duration::from_millis(1));
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        debug!(
            "Resource sync manager started (idle eviction: {}, threshold: {:?})",
            self.options.idle_eviction, self.options.idle_threshold
        );

        loop {
            // Timer ticks and document events drain before new requests
            tokio::select! {
                biased;
                _ = next_sweep(&mut sweep) => self.sweep_idle(Instant::now()),
                (key, event) = self.table.next_event() => self.handle_event(&key, event),
                command = self.commands.recv() => match command {
                    Some(SyncCommand::EnsureSynced { resources, reply }) => {
                        self.ensure_synced(&resources);
                        let _ = reply.send(());
                    }
                    Some(SyncCommand::Inspect { reply }) => {
                        let _ = reply.send(self.table.info());
                    }
                    Some(SyncCommand::Dispose { reply }) => {
                        let evicted = self.evict_all();
                        let _ = reply.send(evicted);
                        break;
                    }
                    None => {
                        self.evict_all();
                        break;
                    }
                },
            }
        }

        debug!("Resource sync manager stopped");
    }

    fn ensure_synced(&mut self, resources: &[Url]) {
        let now = Instant::now();
        for uri in resources {
            let key = resource_key(uri);

            // Edits queued before this request must reach the backend before
            // the caller's detection request does. A queued disposal evicts
            // the entry, so a reopened document is mirrored below.
            let pending = match self.table.get_mut(&key) {
                Some(entry) => {
                    entry.last_used_at = now;
                    entry.subscription.drain()
                }
                None => Vec::new(),
            };
            for event in pending {
                self.handle_event(&key, event);
            }

            if !self.table.contains(&key) {
                self.begin_mirroring(uri, key, now);
            }
        }
    }

    fn begin_mirroring(&mut self, uri: &Url, key: String, now: Instant) {
        let Some(model) = self.documents.get(uri) else {
            debug!("Not mirroring {}: document unavailable", key);
            return;
        };
        if model.is_too_large_for_syncing() {
            debug!("Not mirroring {}: too large", key);
            return;
        }

        // Subscribe before taking the snapshot so no edit falls in between;
        // edits already contained in the snapshot are skipped by version.
        let events = model.subscribe();
        let snapshot = model.snapshot();
        let version = snapshot.version;
        if let Err(e) = self.backend.accept_new_model(snapshot) {
            warn!("Failed to mirror {}: {}", key, e);
            return;
        }

        let backend = self.backend.clone();
        let teardown_key = key.clone();
        let subscription = SubscriptionGroup::new(events, move || {
            if let Err(e) = backend.accept_removed_model(&teardown_key) {
                debug!("Failed to remove mirror for {}: {}", teardown_key, e);
            }
        });

        debug!("Mirroring {} at version {}", key, version);
        self.metrics.record_model_mirrored();
        self.table.insert(SyncedResource {
            key,
            subscription,
            last_used_at: now,
            mirrored_version: version,
        });
    }

    fn handle_event(&mut self, key: &str, event: SubscriptionEvent) {
        match event {
            SubscriptionEvent::Changed(event) => {
                let Some(entry) = self.table.get_mut(key) else {
                    return;
                };
                if event.version <= entry.mirrored_version {
                    trace!("Skipping version {} of {}: already mirrored", event.version, key);
                    return;
                }
                entry.mirrored_version = event.version;
                trace!("Forwarding version {} of {}", event.version, key);
                match self.backend.accept_model_changed(key, event) {
                    Ok(()) => self.metrics.record_change_forwarded(),
                    Err(e) => warn!("Failed to forward change for {}: {}", key, e),
                }
            }
            SubscriptionEvent::Disposed => self.evict(key, EvictionReason::Disposed),
        }
    }

    fn sweep_idle(&mut self, now: Instant) {
        let threshold = self.options.idle_threshold;
        trace!("Idle sweep over {} mirrors", self.table.len());
        let expired: Vec<String> = self
            .table
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.last_used_at) > threshold)
            .map(|entry| entry.key.clone())
            .collect();

        for key in expired {
            self.evict(&key, EvictionReason::Idle);
        }
    }

    /// Runs the teardown, then forgets the entry.
    fn evict(&mut self, key: &str, reason: EvictionReason) {
        let Some(entry) = self.table.get_mut(key) else {
            return;
        };
        entry.subscription.release();
        self.table.remove(key);
        self.metrics.record_eviction(reason);
        debug!("Stopped mirroring {} ({:?})", key, reason);
    }

    fn evict_all(&mut self) -> usize {
        let keys = self.table.keys();
        for key in &keys {
            self.evict(key, EvictionReason::Shutdown);
        }
        keys.len()
    }
}

async fn next_sweep(sweep: &mut Option<Interval>) {
    match sweep {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
