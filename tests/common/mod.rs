//! Shared fakes for the integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use language_detection_worker::backend::{DetectionBackend, LanguageGuess};
use language_detection_worker::client::WorkerFactory;
use language_detection_worker::config::{DetectionSettings, WorkerAssets};
use language_detection_worker::documents::{ModelChangedEvent, ModelContentChange, ModelSnapshot};
use language_detection_worker::error::{DetectionError, DetectionResult};
use language_detection_worker::telemetry::TracingTelemetry;
use language_detection_worker::worker::{
    spawn_detection_worker, KeywordClassifier, LanguageClassifier, WorkerChannel, WorkerHost,
};
use lsp_types::{Position, Range};
use parking_lot::Mutex;
use url::Url;

pub fn uri(name: &str) -> Url {
    Url::parse(&format!("file:///tmp/{}", name)).unwrap()
}

/// Replacement of `[start, end)` on the given zero-based positions.
pub fn edit(start: (u32, u32), end: (u32, u32), text: &str) -> ModelContentChange {
    ModelContentChange {
        range: Range {
            start: Position { line: start.0, character: start.1 },
            end: Position { line: end.0, character: end.1 },
        },
        text: text.to_string(),
    }
}

pub fn insert(line: u32, character: u32, text: &str) -> ModelContentChange {
    edit((line, character), (line, character), text)
}

/// Everything a backend was told, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    New { key: String, version: i32, text: String },
    Changed { key: String, version: i32 },
    Removed { key: String },
    Detect { key: String },
    Shutdown,
}

/// Backend that records calls and answers with canned guesses for mirrored
/// keys.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<BackendCall>>,
    mirrored: Mutex<HashSet<String>>,
    guesses: Mutex<Vec<LanguageGuess>>,
    shut_down: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answering(guesses: &[(&str, f32)]) -> Arc<Self> {
        let backend = Self::default();
        *backend.guesses.lock() = guesses.iter().map(|(label, c)| LanguageGuess::new(*label, *c)).collect();
        Arc::new(backend)
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn new_models(&self) -> Vec<(String, i32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::New { key, version, .. } => Some((key, version)),
                _ => None,
            })
            .collect()
    }

    pub fn changed_versions(&self, key: &str) -> Vec<i32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Changed { key: k, version } if k == key => Some(version),
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Removed { key } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn is_mirrored(&self, key: &str) -> bool {
        self.mirrored.lock().contains(key)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn record(&self, call: BackendCall) -> DetectionResult<()> {
        if self.is_shut_down() {
            return Err(DetectionError::WorkerTerminated);
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait::async_trait]
impl DetectionBackend for RecordingBackend {
    fn accept_new_model(&self, snapshot: ModelSnapshot) -> DetectionResult<()> {
        let key = snapshot.key();
        self.record(BackendCall::New {
            key: key.clone(),
            version: snapshot.version,
            text: snapshot.text(),
        })?;
        self.mirrored.lock().insert(key);
        Ok(())
    }

    fn accept_model_changed(&self, key: &str, event: ModelChangedEvent) -> DetectionResult<()> {
        self.record(BackendCall::Changed {
            key: key.to_string(),
            version: event.version,
        })
    }

    fn accept_removed_model(&self, key: &str) -> DetectionResult<()> {
        self.record(BackendCall::Removed { key: key.to_string() })?;
        self.mirrored.lock().remove(key);
        Ok(())
    }

    async fn detect_language(&self, key: &str) -> DetectionResult<Option<String>> {
        Ok(self.detect_languages(key).await?.into_iter().next().map(|g| g.label))
    }

    async fn detect_languages(&self, key: &str) -> DetectionResult<Vec<LanguageGuess>> {
        self.record(BackendCall::Detect { key: key.to_string() })?;
        if !self.is_mirrored(key) {
            return Ok(Vec::new());
        }
        Ok(self.guesses.lock().clone())
    }

    fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.calls.lock().push(BackendCall::Shutdown);
        }
    }

    fn backend_name(&self) -> &str {
        "recording"
    }
}

/// Factory handing out one shared backend and counting how often it was
/// asked. Creation yields a few times so concurrent callers overlap.
pub struct CountingFactory {
    backend: Arc<RecordingBackend>,
    created: AtomicUsize,
    failures_left: AtomicUsize,
}

impl CountingFactory {
    pub fn new(backend: Arc<RecordingBackend>) -> Arc<Self> {
        Self::failing_first(backend, 0)
    }

    /// The first `failures` creations fail with `WorkerSpawn`.
    pub fn failing_first(backend: Arc<RecordingBackend>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            backend,
            created: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(failures),
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WorkerFactory for CountingFactory {
    async fn create_worker(&self, _host: WorkerHost) -> DetectionResult<Arc<dyn DetectionBackend>> {
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DetectionError::WorkerSpawn("worker bootstrap failed".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.backend.clone())
    }
}

/// Classifier that always returns the same guesses.
pub struct StaticClassifier(pub Vec<LanguageGuess>);

impl LanguageClassifier for StaticClassifier {
    fn classify(&self, _text: &str) -> anyhow::Result<Vec<LanguageGuess>> {
        Ok(self.0.clone())
    }
}

/// Factory spawning a real in-process worker and keeping a handle to it.
pub struct CapturingFactory {
    classifier: Arc<dyn LanguageClassifier>,
    worker: Mutex<Option<WorkerChannel>>,
}

impl CapturingFactory {
    pub fn with_classifier(classifier: Arc<dyn LanguageClassifier>) -> Arc<Self> {
        Arc::new(Self {
            classifier,
            worker: Mutex::new(None),
        })
    }

    pub fn keyword() -> Arc<Self> {
        Self::with_classifier(Arc::new(KeywordClassifier::new()))
    }

    pub fn worker(&self) -> Option<WorkerChannel> {
        self.worker.lock().clone()
    }
}

#[async_trait::async_trait]
impl WorkerFactory for CapturingFactory {
    async fn create_worker(&self, host: WorkerHost) -> DetectionResult<Arc<dyn DetectionBackend>> {
        let classifier = self.classifier.clone();
        let loader = move |_host: &WorkerHost| -> anyhow::Result<Arc<dyn LanguageClassifier>> { Ok(classifier.clone()) };
        let worker = spawn_detection_worker(host, Arc::new(loader), DetectionSettings::default());
        *self.worker.lock() = Some(worker.clone());
        Ok(Arc::new(worker))
    }
}

/// A standalone worker with the keyword classifier.
pub fn keyword_worker() -> WorkerChannel {
    let host = WorkerHost::new("test-worker", WorkerAssets::default(), Arc::new(TracingTelemetry));
    spawn_detection_worker(host, Arc::new(KeywordClassifier::loader()), DetectionSettings::default())
}
