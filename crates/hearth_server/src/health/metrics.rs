//! Process-wide metrics counters. Grounded on
//! `game_server/src/health/metrics.rs`'s counter/gauge/histogram collector,
//! generalized here to the specific signals spec §4.I names: live connection
//! count, active room count, and broadcast/scheduler drift.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use hearth_core::RoomRegistry;
use serde::Serialize;
use tracing::warn;

/// Scheduler drift above this threshold is logged as a warning (spec §4.I).
pub const DRIFT_WARN_THRESHOLD_MS: u64 = 100;
/// Metrics are reported on this cadence (spec §4.I, "every 30s").
pub const REPORT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug)]
pub struct Metrics {
    start_time: Instant,
    connection_count: AtomicUsize,
    room_count: AtomicUsize,
    broadcasts_total: AtomicU64,
    /// Running total of scheduler drift samples, in microseconds, for an
    /// average; paired with `drift_samples` below.
    drift_total_micros: AtomicU64,
    drift_samples: AtomicU64,
    max_drift_micros: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub connection_count: usize,
    pub room_count: usize,
    pub broadcasts_total: u64,
    pub average_drift_ms: f64,
    pub max_drift_ms: f64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            connection_count: AtomicUsize::new(0),
            room_count: AtomicUsize::new(0),
            broadcasts_total: AtomicU64::new(0),
            drift_total_micros: AtomicU64::new(0),
            drift_samples: AtomicU64::new(0),
            max_drift_micros: AtomicU64::new(0),
        })
    }

    pub fn set_connection_count(&self, count: usize) {
        self.connection_count.store(count, Ordering::Relaxed);
    }

    pub fn set_room_count(&self, count: usize) {
        self.room_count.store(count, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self) {
        self.broadcasts_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one scheduler tick's drift (`actual_elapsed - expected_interval`,
    /// spec §4.I). Logs a warning once the drift crosses
    /// [`DRIFT_WARN_THRESHOLD_MS`].
    pub fn record_scheduler_drift(&self, drift: std::time::Duration) {
        let micros = drift.as_micros() as u64;
        self.drift_total_micros.fetch_add(micros, Ordering::Relaxed);
        self.drift_samples.fetch_add(1, Ordering::Relaxed);
        self.max_drift_micros.fetch_max(micros, Ordering::Relaxed);
        if drift.as_millis() as u64 > DRIFT_WARN_THRESHOLD_MS {
            warn!(drift_ms = drift.as_millis(), "scheduler drift exceeded threshold");
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.drift_samples.load(Ordering::Relaxed).max(1);
        let total_micros = self.drift_total_micros.load(Ordering::Relaxed);
        MetricsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            connection_count: self.connection_count.load(Ordering::Relaxed),
            room_count: self.room_count.load(Ordering::Relaxed),
            broadcasts_total: self.broadcasts_total.load(Ordering::Relaxed),
            average_drift_ms: (total_micros as f64 / samples as f64) / 1000.0,
            max_drift_ms: self.max_drift_micros.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            connection_count: AtomicUsize::new(0),
            room_count: AtomicUsize::new(0),
            broadcasts_total: AtomicU64::new(0),
            drift_total_micros: AtomicU64::new(0),
            drift_samples: AtomicU64::new(0),
            max_drift_micros: AtomicU64::new(0),
        }
    }
}

/// Spawns the periodic metrics report loop (spec §4.I, "every 30s").
///
/// Each cycle recomputes the active room count from `rooms` (spec §4.I,
/// "active room count across plugins") and records this tick's own
/// scheduler drift against [`REPORT_INTERVAL`] before logging the snapshot.
pub fn spawn_reporter(
    metrics: Arc<Metrics>,
    rooms: Arc<RoomRegistry>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REPORT_INTERVAL);
        let mut last = Instant::now();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let actual_elapsed = now.duration_since(last);
                    last = now;
                    let drift = actual_elapsed.saturating_sub(REPORT_INTERVAL);
                    metrics.record_scheduler_drift(drift);

                    metrics.set_room_count(rooms.room_count());
                    let snapshot = metrics.snapshot();
                    tracing::info!(
                        connections = snapshot.connection_count,
                        rooms = snapshot.room_count,
                        broadcasts_total = snapshot.broadcasts_total,
                        avg_drift_ms = snapshot.average_drift_ms,
                        max_drift_ms = snapshot.max_drift_ms,
                        "metrics report"
                    );
                }
                _ = shutdown.recv() => {
                    tracing::debug!("metrics reporter stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_values() {
        let metrics = Metrics::new();
        metrics.set_connection_count(42);
        metrics.set_room_count(7);
        metrics.record_broadcast();
        metrics.record_broadcast();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connection_count, 42);
        assert_eq!(snapshot.room_count, 7);
        assert_eq!(snapshot.broadcasts_total, 2);
    }

    #[test]
    fn drift_tracks_average_and_max() {
        let metrics = Metrics::new();
        metrics.record_scheduler_drift(std::time::Duration::from_millis(10));
        metrics.record_scheduler_drift(std::time::Duration::from_millis(30));

        let snapshot = metrics.snapshot();
        assert!((snapshot.average_drift_ms - 20.0).abs() < 0.01);
        assert!((snapshot.max_drift_ms - 30.0).abs() < 0.01);
    }
}
