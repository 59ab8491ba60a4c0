//! Collaborator interfaces the runtime emits to

use serde::{Deserialize, Serialize};

use crate::types::{ExecutionRecord, InstanceKey, Scope};

/// Severity of a plugin log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Destination for plugin log lines. Fire-and-forget.
pub trait LogSink: Send + Sync {
    fn write(&self, scope: &Scope, level: LogLevel, message: &str);
}

/// Destination for per-call execution records. Fire-and-forget.
pub trait MetricsSink: Send + Sync {
    fn record(&self, key: &InstanceKey, record: &ExecutionRecord);
}
