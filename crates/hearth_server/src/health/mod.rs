//! Process health/metrics, and the read-only snapshot types the admin HTTP
//! surface serves (spec §4.I, §4.J). Grounded on
//! `game_server/src/health/mod.rs`'s `HealthManager`, trimmed of the
//! circuit-breaker and GORC/event-system fields this spec has no analogue
//! for.

pub mod metrics;

use serde::Serialize;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub use metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Ok,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: u64,
    pub uptime_seconds: u64,
    pub games: Vec<String>,
}

/// Tracks process start time for the `/health` uptime field (spec §6).
#[derive(Debug, Clone)]
pub struct StartTime(Instant);

impl StartTime {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn report(&self, games: Vec<String>) -> HealthReport {
        HealthReport {
            status: HealthStatus::Ok,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            uptime_seconds: self.0.elapsed().as_secs(),
            games,
        }
    }
}
