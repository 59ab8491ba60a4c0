//! Context building - merges schema defaults with provider configuration

use std::path::PathBuf;
use std::sync::Arc;

use agentry_plugin_api::{
    ConfigSchema, InstanceKey, LogSink, MetricsSink, PluginContext, ResolvedConfig,
};
use serde_json::Map;

use super::config::{ConfigMap, ConfigProvider};

/// Merge declared defaults with provided values.
///
/// Provider values win on collision; keys the schema does not declare are
/// dropped.
pub fn resolve(schema: &ConfigSchema, provided: &ConfigMap) -> ResolvedConfig {
    let mut values = Map::new();
    for option in &schema.options {
        let value = provided
            .get(&option.name)
            .cloned()
            .unwrap_or_else(|| option.default.clone());
        values.insert(option.name.clone(), value);
    }
    ResolvedConfig::new(values)
}

/// Builds one fresh [`PluginContext`] per load
#[derive(Clone)]
pub struct ContextBuilder {
    provider: Arc<dyn ConfigProvider>,
    log: Arc<dyn LogSink>,
    metrics: Arc<dyn MetricsSink>,
    data_root: PathBuf,
}

impl ContextBuilder {
    pub fn new(
        provider: Arc<dyn ConfigProvider>,
        log: Arc<dyn LogSink>,
        metrics: Arc<dyn MetricsSink>,
        data_root: PathBuf,
    ) -> Self {
        Self {
            provider,
            log,
            metrics,
            data_root,
        }
    }

    pub fn provider(&self) -> &Arc<dyn ConfigProvider> {
        &self.provider
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    /// Build the context for `key`. Provider failures degrade to an empty
    /// mapping, so the schema defaults apply.
    pub async fn build(&self, key: &InstanceKey, schema: &ConfigSchema) -> PluginContext {
        let provided = match self.provider.get_config(&key.name, &key.scope).await {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(
                    plugin = %key.name,
                    scope = %key.scope,
                    error = %e,
                    "Config provider failed, using schema defaults"
                );
                ConfigMap::new()
            }
        };

        let ignored: Vec<&str> = provided
            .keys()
            .filter(|k| schema.get(k).is_none())
            .map(String::as_str)
            .collect();
        if !ignored.is_empty() {
            tracing::debug!(plugin = %key.name, keys = ?ignored, "Ignoring undeclared config keys");
        }

        let config = resolve(schema, &provided);
        let data_dir = self.data_root.join(key.scope.dir_name()).join(&key.name);

        PluginContext::new(
            key.clone(),
            config,
            data_dir,
            self.log.clone(),
            self.metrics.clone(),
        )
    }
}
