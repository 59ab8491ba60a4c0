//! Default log and metrics sinks

use std::sync::Mutex;

use agentry_plugin_api::{ExecutionRecord, InstanceKey, LogLevel, LogSink, MetricsSink, Outcome, Scope};

/// Forwards plugin log lines to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn write(&self, scope: &Scope, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(scope = %scope, "{}", message),
            LogLevel::Info => tracing::info!(scope = %scope, "{}", message),
            LogLevel::Warn => tracing::warn!(scope = %scope, "{}", message),
            LogLevel::Error => tracing::error!(scope = %scope, "{}", message),
        }
    }
}

/// Emits each execution record as a `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record(&self, key: &InstanceKey, record: &ExecutionRecord) {
        let duration_ms = record.duration.as_secs_f64() * 1000.0;
        match record.outcome {
            Outcome::Success => tracing::debug!(
                plugin = %key.name,
                scope = %key.scope,
                duration_ms,
                "Plugin execution succeeded"
            ),
            Outcome::Failure(kind) => tracing::debug!(
                plugin = %key.name,
                scope = %key.scope,
                duration_ms,
                kind = %kind,
                "Plugin execution failed"
            ),
        }
    }
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryMetricsSink {
    records: Mutex<Vec<(InstanceKey, ExecutionRecord)>>,
}

impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(InstanceKey, ExecutionRecord)> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Records for one key
    pub fn records_for(&self, key: &InstanceKey) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, r)| *r)
            .collect()
    }
}

impl MetricsSink for MemoryMetricsSink {
    fn record(&self, key: &InstanceKey, record: &ExecutionRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((key.clone(), *record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_plugin_api::ErrorKind;
    use std::time::Duration;

    #[test]
    fn test_memory_sink_filters_by_key() {
        let sink = MemoryMetricsSink::new();
        let echo = InstanceKey::new("echo", Scope::System);
        let time = InstanceKey::new("time", Scope::System);

        sink.record(
            &echo,
            &ExecutionRecord {
                duration: Duration::from_millis(2),
                outcome: Outcome::Success,
            },
        );
        sink.record(
            &time,
            &ExecutionRecord {
                duration: Duration::from_millis(3),
                outcome: Outcome::Failure(ErrorKind::Timeout),
            },
        );

        assert_eq!(sink.records().len(), 2);
        let echo_records = sink.records_for(&echo);
        assert_eq!(echo_records.len(), 1);
        assert!(echo_records[0].outcome.is_success());
    }

    #[test]
    fn test_tracing_sinks_accept_all_levels() {
        let log = TracingLogSink;
        for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            log.write(&Scope::System, level, "message");
        }
        TracingMetricsSink.record(
            &InstanceKey::new("echo", Scope::System),
            &ExecutionRecord {
                duration: Duration::ZERO,
                outcome: Outcome::Failure(ErrorKind::Domain),
            },
        );
    }
}
