pub mod backend;
pub mod client;
pub mod config;
pub mod documents;
pub mod error;
pub mod language_ids;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod sync;
pub mod telemetry;
pub mod worker;

pub use backend::{DetectionBackend, LanguageGuess};
pub use client::{ClientState, InProcessWorkerFactory, LanguageDetectionWorkerClient, WorkerFactory};
pub use config::ClientConfig;
pub use error::{DetectionError, DetectionResult};
pub use service::LanguageDetectionService;
