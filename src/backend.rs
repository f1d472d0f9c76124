//! Detection backend abstraction
//!
//! The sync manager and the worker client only talk to the worker through
//! this trait, so the in-process worker, a remote process, or a recording
//! fake in tests are interchangeable.

use serde::{Deserialize, Serialize};

use crate::documents::{ModelChangedEvent, ModelSnapshot};
use crate::error::DetectionResult;

/// A classifier guess for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageGuess {
    /// Raw model label (not yet an editor language id).
    pub label: String,
    pub confidence: f32,
}

impl LanguageGuess {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Common interface for language detection backends
///
/// Mirror notifications are fire-and-forget and must be delivered in call
/// order: a change sent after a snapshot is applied after it, and a detection
/// request sent after a notification observes it. An `Err` from a
/// notification means it was not delivered.
#[async_trait::async_trait]
pub trait DetectionBackend: Send + Sync {
    /// Starts mirroring a document from a full snapshot.
    fn accept_new_model(&self, snapshot: ModelSnapshot) -> DetectionResult<()>;

    /// Applies an incremental delta to an existing mirror.
    fn accept_model_changed(&self, key: &str, event: ModelChangedEvent) -> DetectionResult<()>;

    /// Drops the mirror for `key`.
    fn accept_removed_model(&self, key: &str) -> DetectionResult<()>;

    /// Best guess for the mirrored text of `key`, or `None` when there is
    /// nothing confident to report (including when `key` is not mirrored).
    async fn detect_language(&self, key: &str) -> DetectionResult<Option<String>>;

    /// Ranked guesses for the mirrored text of `key`, best first.
    async fn detect_languages(&self, key: &str) -> DetectionResult<Vec<LanguageGuess>>;

    /// Terminates the backend. Later calls may fail with `WorkerTerminated`.
    fn shutdown(&self) {}

    /// Get a human-readable name for this backend (for logging/debugging)
    fn backend_name(&self) -> &str;
}
