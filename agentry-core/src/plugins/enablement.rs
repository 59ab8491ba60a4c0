//! Enablement stores - persisted "enabled" flags per plugin and scope

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use agentry_plugin_api::{InstanceKey, Scope};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::error::RuntimeError;

/// Persistence of the enabled flag behind `enable`/`disable`
#[async_trait]
pub trait EnablementStore: Send + Sync {
    async fn set_enabled(&self, key: &InstanceKey, enabled: bool) -> Result<(), RuntimeError>;

    async fn is_enabled(&self, key: &InstanceKey) -> Result<bool, RuntimeError>;

    /// Every key currently flagged enabled
    async fn enabled(&self) -> Result<Vec<InstanceKey>, RuntimeError>;
}

/// Enabled plugin names grouped by scope
///
/// Stored as TOML:
///
/// ```toml
/// [scopes]
/// system = ["time"]
/// "agent:7" = ["calculator", "echo"]
/// ```
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnabledPlugins {
    #[serde(default)]
    pub scopes: BTreeMap<String, BTreeSet<String>>,
}

impl EnabledPlugins {
    /// Load from a TOML file. A missing file is an empty set.
    pub async fn load(path: &Path) -> Result<Self, RuntimeError> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        toml::from_str(&content).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    pub async fn save(&self, path: &Path) -> Result<(), RuntimeError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| RuntimeError::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn is_enabled(&self, key: &InstanceKey) -> bool {
        self.scopes
            .get(&key.scope.to_string())
            .is_some_and(|names| names.contains(&key.name))
    }

    pub fn enable(&mut self, key: &InstanceKey) {
        self.scopes
            .entry(key.scope.to_string())
            .or_default()
            .insert(key.name.clone());
    }

    pub fn disable(&mut self, key: &InstanceKey) {
        let scope = key.scope.to_string();
        if let Some(names) = self.scopes.get_mut(&scope) {
            names.remove(&key.name);
            if names.is_empty() {
                self.scopes.remove(&scope);
            }
        }
    }

    /// All enabled keys. Scope strings that fail to parse are skipped.
    pub fn keys(&self) -> Vec<InstanceKey> {
        self.scopes
            .iter()
            .filter_map(|(scope, names)| match scope.parse::<Scope>() {
                Ok(scope) => Some(
                    names
                        .iter()
                        .map(move |name| InstanceKey::new(name.clone(), scope.clone())),
                ),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unparseable scope in enabled plugins");
                    None
                }
            })
            .flatten()
            .collect()
    }
}

/// In-memory store, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryEnablementStore {
    state: Mutex<EnabledPlugins>,
}

impl MemoryEnablementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EnablementStore for MemoryEnablementStore {
    async fn set_enabled(&self, key: &InstanceKey, enabled: bool) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().await;
        if enabled {
            state.enable(key);
        } else {
            state.disable(key);
        }
        Ok(())
    }

    async fn is_enabled(&self, key: &InstanceKey) -> Result<bool, RuntimeError> {
        Ok(self.state.lock().await.is_enabled(key))
    }

    async fn enabled(&self) -> Result<Vec<InstanceKey>, RuntimeError> {
        Ok(self.state.lock().await.keys())
    }
}

/// Store backed by `enabled.toml`.
///
/// Read-modify-write cycles are serialized within the process.
#[derive(Debug)]
pub struct FileEnablementStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileEnablementStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at `<plugin config dir>/enabled.toml`
    pub fn user_default() -> Self {
        Self::new(agentry_paths::enabled_file(&agentry_paths::plugin_config_dir()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EnablementStore for FileEnablementStore {
    async fn set_enabled(&self, key: &InstanceKey, enabled: bool) -> Result<(), RuntimeError> {
        let _guard = self.lock.lock().await;
        let mut state = EnabledPlugins::load(&self.path).await?;
        if enabled {
            state.enable(key);
        } else {
            state.disable(key);
        }
        state.save(&self.path).await
    }

    async fn is_enabled(&self, key: &InstanceKey) -> Result<bool, RuntimeError> {
        let _guard = self.lock.lock().await;
        Ok(EnabledPlugins::load(&self.path).await?.is_enabled(key))
    }

    async fn enabled(&self) -> Result<Vec<InstanceKey>, RuntimeError> {
        let _guard = self.lock.lock().await;
        Ok(EnabledPlugins::load(&self.path).await?.keys())
    }
}
