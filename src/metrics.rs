//! Lifecycle and latency metrics for a detection client
//!
//! Each client owns one [`Metrics`] instance shared with its sync manager,
//! so counters describe a single worker lifetime.
//!
//! ## Metrics Tracked
//!
//! - Worker spawns and sync manager creations
//! - Mirrors created, evicted (by reason) and change events forwarded
//! - Detection requests, failures and latencies
//!
//! ## Design
//!
//! - Lock-free atomic counters for high-frequency operations
//! - DashMap for low-contention histogram storage

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Why a mirror was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The owning document was disposed.
    Disposed,
    /// The resource was not requested within the idle threshold.
    Idle,
    /// The sync manager itself was disposed.
    Shutdown,
}

/// Performance metrics registry
#[derive(Debug, Default)]
pub struct Metrics {
    worker_spawns: AtomicU64,
    manager_creations: AtomicU64,

    models_mirrored: AtomicU64,
    evicted_disposed: AtomicU64,
    evicted_idle: AtomicU64,
    evicted_shutdown: AtomicU64,
    changes_forwarded: AtomicU64,

    detections: AtomicU64,
    detection_failures: AtomicU64,

    // Timing histograms (operation name -> list of durations in microseconds)
    operation_timings: DashMap<String, Vec<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_worker_spawn(&self) {
        self.worker_spawns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_manager_creation(&self) {
        self.manager_creations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_model_mirrored(&self) {
        self.models_mirrored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self, reason: EvictionReason) {
        let counter = match reason {
            EvictionReason::Disposed => &self.evicted_disposed,
            EvictionReason::Idle => &self.evicted_idle,
            EvictionReason::Shutdown => &self.evicted_shutdown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_change_forwarded(&self) {
        self.changes_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection(&self) {
        self.detections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_failure(&self) {
        self.detection_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the timing of an operation
    ///
    /// # Arguments
    /// * `operation` - Name of the operation (e.g., "detect_language")
    /// * `duration` - Duration of the operation
    pub fn record_timing(&self, operation: &str, duration: Duration) {
        let micros = duration.as_micros() as u64;

        self.operation_timings
            .entry(operation.to_string())
            .or_default()
            .push(micros);
    }

    /// Gets summary statistics for an operation
    pub fn operation_stats(&self, operation: &str) -> Option<OperationStats> {
        self.operation_timings.get(operation).map(|timings| {
            let mut sorted = timings.value().clone();
            sorted.sort_unstable();

            let count = sorted.len();
            if count == 0 {
                return OperationStats::default();
            }

            let sum: u64 = sorted.iter().sum();
            let p95_idx = (count as f64 * 0.95) as usize;

            OperationStats {
                count,
                min_micros: sorted[0],
                max_micros: sorted[count - 1],
                mean_micros: sum / count as u64,
                p50_micros: sorted[count / 2],
                p95_micros: sorted[p95_idx.min(count - 1)],
            }
        })
    }

    /// Gets a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            worker_spawns: self.worker_spawns.load(Ordering::Relaxed),
            manager_creations: self.manager_creations.load(Ordering::Relaxed),
            models_mirrored: self.models_mirrored.load(Ordering::Relaxed),
            evicted_disposed: self.evicted_disposed.load(Ordering::Relaxed),
            evicted_idle: self.evicted_idle.load(Ordering::Relaxed),
            evicted_shutdown: self.evicted_shutdown.load(Ordering::Relaxed),
            changes_forwarded: self.changes_forwarded.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            detection_failures: self.detection_failures.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for a single operation
#[derive(Debug, Clone, Default)]
pub struct OperationStats {
    pub count: usize,
    pub min_micros: u64,
    pub max_micros: u64,
    pub mean_micros: u64,
    pub p50_micros: u64,  // Median
    pub p95_micros: u64,
}

/// Plain copy of the counters in [`Metrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub worker_spawns: u64,
    pub manager_creations: u64,
    pub models_mirrored: u64,
    pub evicted_disposed: u64,
    pub evicted_idle: u64,
    pub evicted_shutdown: u64,
    pub changes_forwarded: u64,
    pub detections: u64,
    pub detection_failures: u64,
}

impl MetricsSnapshot {
    pub fn evicted_total(&self) -> u64 {
        self.evicted_disposed + self.evicted_idle + self.evicted_shutdown
    }
}

/// RAII guard for automatic timing measurement
///
/// Records the duration of a scope when dropped.
pub struct TimingGuard {
    metrics: Arc<Metrics>,
    operation: &'static str,
    start: Instant,
}

impl TimingGuard {
    pub fn new(metrics: Arc<Metrics>, operation: &'static str) -> Self {
        Self {
            metrics,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        self.metrics.record_timing(self.operation, self.start.elapsed());
    }
}
