//! Bootstrap host handed to a worker when it is spawned.

use std::fmt;
use std::sync::Arc;

use crate::config::WorkerAssets;
use crate::telemetry::{self, DetectionReport, TelemetrySink};

/// Asset accessors and the telemetry callback exposed to the worker.
#[derive(Clone)]
pub struct WorkerHost {
    label: String,
    assets: WorkerAssets,
    telemetry: Arc<dyn TelemetrySink>,
}

impl WorkerHost {
    pub fn new(label: impl Into<String>, assets: WorkerAssets, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            label: label.into(),
            assets,
            telemetry,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bootstrap_uri(&self) -> &str {
        &self.assets.bootstrap
    }

    pub fn model_json_uri(&self) -> &str {
        &self.assets.model_json
    }

    pub fn weights_uri(&self) -> &str {
        &self.assets.weights
    }

    /// Forwards a model run to the telemetry sink without waiting on it.
    pub fn send_telemetry(&self, report: DetectionReport) {
        telemetry::dispatch(self.telemetry.clone(), report);
    }
}

impl fmt::Debug for WorkerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHost")
            .field("label", &self.label)
            .field("assets", &self.assets)
            .finish_non_exhaustive()
    }
}
