//! Per-instance execution counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use agentry_plugin_api::{ErrorKind, ExecutionRecord, Outcome};
use serde::{Deserialize, Serialize};

/// Lock-free aggregate of every execution record for one instance
#[derive(Debug, Default)]
pub struct InstanceMetrics {
    executions: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    total_micros: AtomicU64,
}

impl InstanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: &ExecutionRecord) {
        let micros = u64::try_from(record.duration.as_micros()).unwrap_or(u64::MAX);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
        if let Outcome::Failure(kind) = record.outcome {
            self.errors.fetch_add(1, Ordering::Relaxed);
            if kind == ErrorKind::Timeout {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
        }
        // Bumped last so a reader never sees a count without its duration.
        self.executions.fetch_add(1, Ordering::Release);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let executions = self.executions.load(Ordering::Acquire);
        MetricsSnapshot {
            executions,
            errors: self.errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            total_duration: Duration::from_micros(self.total_micros.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of [`InstanceMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub executions: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub total_duration: Duration,
}

impl MetricsSnapshot {
    pub fn average_duration(&self) -> Duration {
        if self.executions == 0 {
            return Duration::ZERO;
        }
        let micros = u64::try_from(self.total_duration.as_micros()).unwrap_or(u64::MAX);
        Duration::from_micros(micros / self.executions)
    }

    pub fn successes(&self) -> u64 {
        self.executions.saturating_sub(self.errors)
    }
}
