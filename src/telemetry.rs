//! Telemetry sink for detection results
//!
//! The worker reports every model run here. Reporting is fire-and-forget:
//! sink errors are logged, sink panics are contained in a detached task, and
//! neither reaches the caller waiting on a detection result.

use tracing::{info, warn};

/// One model run as seen by telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub labels: Vec<String>,
    pub confidences: Vec<f32>,
    pub elapsed_ms: u64,
}

pub trait TelemetrySink: Send + Sync {
    fn language_detected(&self, report: &DetectionReport) -> anyhow::Result<()>;
}

/// Default sink: a structured log line per model run.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn language_detected(&self, report: &DetectionReport) -> anyhow::Result<()> {
        info!(
            labels = ?report.labels,
            confidences = ?report.confidences,
            elapsed_ms = report.elapsed_ms,
            "automaticlanguagedetection.perf"
        );
        Ok(())
    }
}

/// Hands `report` to `sink` on a detached task.
pub(crate) fn dispatch(sink: std::sync::Arc<dyn TelemetrySink>, report: DetectionReport) {
    tokio::spawn(async move {
        if let Err(e) = sink.language_detected(&report) {
            warn!("Telemetry sink failed: {:#}", e);
        }
    });
}
