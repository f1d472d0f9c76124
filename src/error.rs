//! Error taxonomy for the detection client and its worker.
//!
//! Unavailable documents (closed, or too large to mirror)
//! are absent from this enum: they degrade detection instead of failing it.

use thiserror::Error;

/// Errors surfaced to callers of the worker client and the sync manager.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectionError {
    /// The client or manager was disposed before (or while) the call was made.
    #[error("language detection client has been disposed")]
    Disposed,

    /// The worker's request channel is closed or a reply was dropped.
    #[error("language detection worker terminated")]
    WorkerTerminated,

    /// The worker factory could not create a worker.
    #[error("failed to spawn language detection worker: {0}")]
    WorkerSpawn(String),

    /// The classifier could not be loaded from the configured assets.
    #[error("failed to load language detection model: {0}")]
    ModelLoad(String),

    /// The classifier failed or panicked while running.
    #[error("language classification failed: {0}")]
    Classification(String),
}

pub type DetectionResult<T> = Result<T, DetectionError>;
