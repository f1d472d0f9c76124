//! In-process language detection worker
//!
//! The worker is a background task that owns the document mirrors and the
//! classifier. Callers talk to it through [`WorkerChannel`], which sends
//! requests over a single unbounded channel: the worker handles them strictly
//! in arrival order, so a detection request always observes every mirror
//! notification sent before it. Classification itself runs on the blocking
//! pool so it never stalls the async runtime.

pub mod classifier;
pub mod host;
pub mod mirror;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::backend::{DetectionBackend, LanguageGuess};
use crate::config::DetectionSettings;
use crate::documents::{ModelChangedEvent, ModelSnapshot};
use crate::error::{DetectionError, DetectionResult};
use crate::telemetry::DetectionReport;

pub use classifier::{ClassifierLoader, KeywordClassifier, LanguageClassifier};
pub use host::WorkerHost;
pub use mirror::MirrorModel;

/// Messages accepted by the worker task
#[derive(Debug)]
pub enum WorkerRequest {
    AcceptNewModel(ModelSnapshot),
    AcceptModelChanged {
        key: String,
        event: ModelChangedEvent,
    },
    AcceptRemovedModel {
        key: String,
    },
    DetectLanguage {
        key: String,
        response: oneshot::Sender<DetectionResult<Option<String>>>,
    },
    DetectLanguages {
        key: String,
        response: oneshot::Sender<DetectionResult<Vec<LanguageGuess>>>,
    },
    /// Current mirror text for `key`, for diagnostics.
    MirrorText {
        key: String,
        response: oneshot::Sender<Option<String>>,
    },
    /// Stops the worker once every earlier request has been handled.
    Shutdown,
}

/// Handle to the detection worker
///
/// Cloning shares the same worker. The worker stops when every handle is
/// dropped or when it reaches the request queued by
/// [`DetectionBackend::shutdown`].
#[derive(Debug, Clone)]
pub struct WorkerChannel {
    id: Uuid,
    label: String,
    request_tx: mpsc::UnboundedSender<WorkerRequest>,
}

impl WorkerChannel {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Checks if the worker is still running
    pub fn is_running(&self) -> bool {
        !self.request_tx.is_closed()
    }

    /// Returns the worker's current copy of `key`, if mirrored.
    pub async fn mirrored_text(&self, key: &str) -> DetectionResult<Option<String>> {
        let (response, rx) = oneshot::channel();
        self.send(WorkerRequest::MirrorText {
            key: key.to_string(),
            response,
        })?;
        rx.await.map_err(|_| DetectionError::WorkerTerminated)
    }

    fn send(&self, request: WorkerRequest) -> DetectionResult<()> {
        self.request_tx.send(request).map_err(|_| DetectionError::WorkerTerminated)
    }
}

#[async_trait::async_trait]
impl DetectionBackend for WorkerChannel {
    fn accept_new_model(&self, snapshot: ModelSnapshot) -> DetectionResult<()> {
        self.send(WorkerRequest::AcceptNewModel(snapshot))
    }

    fn accept_model_changed(&self, key: &str, event: ModelChangedEvent) -> DetectionResult<()> {
        self.send(WorkerRequest::AcceptModelChanged {
            key: key.to_string(),
            event,
        })
    }

    fn accept_removed_model(&self, key: &str) -> DetectionResult<()> {
        self.send(WorkerRequest::AcceptRemovedModel { key: key.to_string() })
    }

    async fn detect_language(&self, key: &str) -> DetectionResult<Option<String>> {
        let (response, rx) = oneshot::channel();
        self.send(WorkerRequest::DetectLanguage {
            key: key.to_string(),
            response,
        })?;
        rx.await.map_err(|_| DetectionError::WorkerTerminated)?
    }

    async fn detect_languages(&self, key: &str) -> DetectionResult<Vec<LanguageGuess>> {
        let (response, rx) = oneshot::channel();
        self.send(WorkerRequest::DetectLanguages {
            key: key.to_string(),
            response,
        })?;
        rx.await.map_err(|_| DetectionError::WorkerTerminated)?
    }

    fn shutdown(&self) {
        debug!("Shutting down detection worker '{}' ({})", self.label, self.id);
        // Queued behind pending removals so they still reach the mirrors
        if self.send(WorkerRequest::Shutdown).is_err() {
            trace!("Detection worker '{}' already stopped", self.label);
        }
    }

    fn backend_name(&self) -> &str {
        &self.label
    }
}

/// Spawns a detection worker on the current runtime
///
/// # Arguments
///
/// * `host` - Bootstrap host: asset locations and telemetry sink
/// * `loader` - Builds the classifier on the first detection request
/// * `settings` - Content limits and ranking thresholds
pub fn spawn_detection_worker(
    host: WorkerHost,
    loader: Arc<dyn ClassifierLoader>,
    settings: DetectionSettings,
) -> WorkerChannel {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let id = Uuid::new_v4();
    let label = host.label().to_string();

    let worker = DetectionWorker {
        id,
        host,
        loader,
        settings,
        classifier: None,
        mirrors: HashMap::new(),
    };
    tokio::spawn(worker.run(request_rx));

    WorkerChannel { id, label, request_tx }
}

struct DetectionWorker {
    id: Uuid,
    host: WorkerHost,
    loader: Arc<dyn ClassifierLoader>,
    settings: DetectionSettings,
    classifier: Option<Arc<dyn LanguageClassifier>>,
    mirrors: HashMap<String, MirrorModel>,
}

impl DetectionWorker {
    async fn run(mut self, mut request_rx: mpsc::UnboundedReceiver<WorkerRequest>) {
        debug!("Detection worker '{}' ({}) started", self.host.label(), self.id);

        while let Some(request) = request_rx.recv().await {
            if matches!(request, WorkerRequest::Shutdown) {
                // Requests queued after shutdown fail with `WorkerTerminated`
                request_rx.close();
                break;
            }
            self.handle(request).await;
        }

        debug!(
            "Detection worker '{}' ({}) stopped with {} mirrors",
            self.host.label(),
            self.id,
            self.mirrors.len()
        );
    }

    async fn handle(&mut self, request: WorkerRequest) {
        match request {
            WorkerRequest::AcceptNewModel(snapshot) => {
                let key = snapshot.key();
                trace!("Mirroring {} at version {}", key, snapshot.version);
                if self.mirrors.insert(key.clone(), MirrorModel::from_snapshot(&snapshot)).is_some() {
                    warn!("Replaced existing mirror for {}", key);
                }
            }
            WorkerRequest::AcceptModelChanged { key, event } => match self.mirrors.get_mut(&key) {
                Some(mirror) => {
                    if !mirror.apply(&event) {
                        trace!("Ignoring stale version {} for {} (at {})", event.version, key, mirror.version());
                    }
                }
                None => trace!("Ignoring change for unmirrored {}", key),
            },
            WorkerRequest::AcceptRemovedModel { key } => {
                if self.mirrors.remove(&key).is_none() {
                    trace!("Removal for unmirrored {}", key);
                }
            }
            WorkerRequest::DetectLanguage { key, response } => {
                let result = self
                    .run_model(&key)
                    .await
                    .map(|guesses| guesses.into_iter().next().map(|g| g.label));
                if response.send(result).is_err() {
                    warn!("Failed to send detection result (receiver dropped)");
                }
            }
            WorkerRequest::DetectLanguages { key, response } => {
                let max_guesses = self.settings.max_guesses;
                let result = self.run_model(&key).await.map(|mut guesses| {
                    guesses.truncate(max_guesses);
                    guesses
                });
                if response.send(result).is_err() {
                    warn!("Failed to send detection result (receiver dropped)");
                }
            }
            WorkerRequest::MirrorText { key, response } => {
                let _ = response.send(self.mirrors.get(&key).map(MirrorModel::text));
            }
            WorkerRequest::Shutdown => {}
        }
    }

    fn classifier(&mut self) -> DetectionResult<Arc<dyn LanguageClassifier>> {
        if let Some(classifier) = &self.classifier {
            return Ok(classifier.clone());
        }
        debug!(
            "Loading classifier (model: '{}', weights: '{}')",
            self.host.model_json_uri(),
            self.host.weights_uri()
        );
        let classifier = self
            .loader
            .load(&self.host)
            .map_err(|e| DetectionError::ModelLoad(format!("{:#}", e)))?;
        self.classifier = Some(classifier.clone());
        Ok(classifier)
    }

    /// Runs the classifier over the mirror of `key` and returns confident
    /// guesses, best first. An unmirrored key or too little text yields an
    /// empty list without running the model.
    async fn run_model(&mut self, key: &str) -> DetectionResult<Vec<LanguageGuess>> {
        let Some(mirror) = self.mirrors.get(key) else {
            debug!("Detection requested for unmirrored {}", key);
            return Ok(Vec::new());
        };
        let text = mirror.text_for_detection(self.settings.max_content_chars);
        if text.chars().filter(|c| !c.is_whitespace()).count() < self.settings.min_content_chars {
            trace!("Too little content in {} to classify", key);
            return Ok(Vec::new());
        }

        let classifier = self.classifier()?;
        let start = Instant::now();
        let guesses = tokio::task::spawn_blocking(move || classifier.classify(&text))
            .await
            .map_err(|e| {
                error!("Classifier task panicked: {}", e);
                DetectionError::Classification(e.to_string())
            })?
            .map_err(|e| DetectionError::Classification(format!("{:#}", e)))?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let ranked = rank(guesses, self.settings.min_confidence);
        debug!("Classified {} in {}ms: {:?}", key, elapsed_ms, ranked.first().map(|g| &g.label));

        self.host.send_telemetry(DetectionReport {
            labels: ranked.iter().map(|g| g.label.clone()).collect(),
            confidences: ranked.iter().map(|g| g.confidence).collect(),
            elapsed_ms,
        });

        Ok(ranked)
    }
}

/// Drops guesses below `min_confidence` and sorts the rest best first.
/// Ties keep the classifier's order.
fn rank(mut guesses: Vec<LanguageGuess>, min_confidence: f32) -> Vec<LanguageGuess> {
    guesses.retain(|g| g.confidence >= min_confidence);
    guesses.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    guesses
}
