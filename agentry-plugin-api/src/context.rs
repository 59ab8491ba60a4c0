//! PluginContext - per-instance configuration and collaborator handles

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::sink::{LogLevel, LogSink, MetricsSink};
use crate::types::{InstanceKey, Scope};

/// Configuration snapshot resolved at load time.
///
/// Accessors never fail: a missing key or a value of the wrong type yields
/// the caller's default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedConfig {
    values: Map<String, Value>,
}

impl ResolvedConfig {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Raw value for a key
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.values
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Deserialize a value into any type, falling back to `default` on mismatch
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(default)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-instance bundle handed to a variant's `initialize` hook.
///
/// Built once per load and never shared between instances; a configuration
/// change requires a reload.
pub struct PluginContext {
    key: InstanceKey,
    config: ResolvedConfig,
    data_dir: PathBuf,
    log: Arc<dyn LogSink>,
    metrics: Arc<dyn MetricsSink>,
}

impl PluginContext {
    pub fn new(
        key: InstanceKey,
        config: ResolvedConfig,
        data_dir: PathBuf,
        log: Arc<dyn LogSink>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            key,
            config,
            data_dir,
            log,
            metrics,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.key.name
    }

    pub fn scope(&self) -> &Scope {
        &self.key.scope
    }

    pub fn key(&self) -> &InstanceKey {
        &self.key
    }

    /// Resolved configuration snapshot
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Directory the plugin may use for its own files in this scope.
    ///
    /// The directory is not created eagerly.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    // ─── Logging ─────────────────────────────────────────────────────

    fn log(&self, level: LogLevel, message: &str) {
        self.log
            .write(&self.key.scope, level, &format!("[{}] {}", self.key.name, message));
    }

    pub fn log_debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn log_info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn log_warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn log_error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("key", &self.key)
            .field("config", &self.config)
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}
