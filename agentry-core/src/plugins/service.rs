//! PluginService - caller-facing operations over the registry
//!
//! Adds the persisted "enabled" flag on top of load/unload, ad-hoc test
//! calls, and config pass-through to the provider.

use std::sync::Arc;
use std::time::{Duration, Instant};

use agentry_plugin_api::{InstanceKey, Payload, PluginDescriptor, PluginRequest, Scope};
use serde::{Deserialize, Serialize};

use super::config::ConfigMap;
use super::enablement::EnablementStore;
use super::error::{ErrorReport, RuntimeError};
use super::registry::{PluginInfo, PluginRegistry};

/// Result of [`PluginService::test`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
    pub duration_ms: u64,
}

/// Result of [`PluginService::restore`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub loaded: Vec<InstanceKey>,
    pub failed: Vec<(InstanceKey, ErrorReport)>,
}

/// A variant the loader can build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailablePlugin {
    pub implementation: String,
    pub descriptor: PluginDescriptor,
}

pub struct PluginService {
    registry: Arc<PluginRegistry>,
    enablement: Arc<dyn EnablementStore>,
}

impl PluginService {
    pub fn new(registry: Arc<PluginRegistry>, enablement: Arc<dyn EnablementStore>) -> Self {
        Self {
            registry,
            enablement,
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Load `name` in `scope` and persist it as enabled.
    ///
    /// The implementation reference is the plugin name. If the flag cannot
    /// be persisted the freshly loaded instance is unloaded again.
    pub async fn enable(&self, name: &str, scope: Scope) -> Result<PluginInfo, RuntimeError> {
        let info = self.registry.load(name, scope.clone(), name).await?;

        let key = InstanceKey::new(name, scope.clone());
        if let Err(e) = self.enablement.set_enabled(&key, true).await {
            tracing::warn!(plugin = %name, scope = %scope, error = %e, "Failed to persist enabled flag");
            self.registry.unload(name, scope).await;
            return Err(e);
        }

        tracing::info!(plugin = %name, scope = %scope, "Enabled plugin");
        Ok(info)
    }

    /// Unload `name` in `scope` and clear its enabled flag.
    ///
    /// Returns whether an instance was loaded.
    pub async fn disable(&self, name: &str, scope: Scope) -> Result<bool, RuntimeError> {
        let was_loaded = self.registry.unload(name, scope.clone()).await;
        self.enablement
            .set_enabled(&InstanceKey::new(name, scope.clone()), false)
            .await?;
        tracing::info!(plugin = %name, scope = %scope, was_loaded, "Disabled plugin");
        Ok(was_loaded)
    }

    /// Load every plugin persisted as enabled. One failure does not stop
    /// the others.
    pub async fn restore(&self) -> Result<RestoreReport, RuntimeError> {
        let mut report = RestoreReport::default();
        for key in self.enablement.enabled().await? {
            match self
                .registry
                .load(&key.name, key.scope.clone(), &key.name)
                .await
            {
                Ok(_) => report.loaded.push(key),
                Err(e) => {
                    tracing::warn!(plugin = %key.name, scope = %key.scope, error = %e, "Failed to restore plugin");
                    report.failed.push((key, e.report()));
                }
            }
        }
        tracing::info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Restored enabled plugins"
        );
        Ok(report)
    }

    /// Execute an ad-hoc request and report the outcome
    pub async fn test(
        &self,
        name: &str,
        scope: Scope,
        request: PluginRequest,
        timeout: Option<Duration>,
    ) -> TestReport {
        let started = Instant::now();
        let outcome = self.registry.execute(name, scope, request, timeout).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(payload) => TestReport {
                success: true,
                result: Some(payload),
                error: None,
                duration_ms,
            },
            Err(e) => TestReport {
                success: false,
                result: None,
                error: Some(e.report()),
                duration_ms,
            },
        }
    }

    pub async fn list(&self, scope: &Scope) -> Vec<PluginInfo> {
        self.registry.list(scope).await
    }

    pub async fn info(&self, name: &str, scope: Scope) -> Result<PluginInfo, RuntimeError> {
        Ok(self.registry.get(name, scope).await?.info())
    }

    /// Every variant the loader knows, with its descriptor
    pub fn available(&self) -> Vec<AvailablePlugin> {
        self.registry
            .loader()
            .describe_all()
            .into_iter()
            .filter_map(|(implementation, described)| match described {
                Ok(descriptor) => Some(AvailablePlugin {
                    implementation,
                    descriptor,
                }),
                Err(e) => {
                    tracing::warn!(implementation = %implementation, error = %e, "Cannot describe plugin");
                    None
                }
            })
            .collect()
    }

    pub async fn get_config(&self, name: &str, scope: &Scope) -> Result<ConfigMap, RuntimeError> {
        self.registry.provider().get_config(name, scope).await
    }

    /// Store configuration. Live instances keep their snapshot until reloaded.
    pub async fn put_config(
        &self,
        name: &str,
        scope: &Scope,
        config: ConfigMap,
    ) -> Result<(), RuntimeError> {
        self.registry.provider().put_config(name, scope, config).await
    }

    /// Unload everything
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
    }
}

impl std::fmt::Debug for PluginService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginService")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
