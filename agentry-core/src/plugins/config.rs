//! Config providers - supply configuration rows for a plugin in a scope
//!
//! The runtime only reads and merges these mappings; persistence belongs to
//! the provider.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use agentry_plugin_api::Scope;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::error::RuntimeError;

/// Configuration mapping for one plugin in one scope
pub type ConfigMap = Map<String, Value>;

/// Source of plugin configuration
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Mapping for `plugin_name` in `scope`. Empty if nothing is stored.
    async fn get_config(&self, plugin_name: &str, scope: &Scope) -> Result<ConfigMap, RuntimeError>;

    /// Replace the mapping for `plugin_name` in `scope`
    async fn put_config(
        &self,
        plugin_name: &str,
        scope: &Scope,
        config: ConfigMap,
    ) -> Result<(), RuntimeError>;
}

/// In-memory provider, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    rows: RwLock<HashMap<(String, Scope), ConfigMap>>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn get_config(&self, plugin_name: &str, scope: &Scope) -> Result<ConfigMap, RuntimeError> {
        Ok(self
            .rows
            .read()
            .await
            .get(&(plugin_name.to_string(), scope.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn put_config(
        &self,
        plugin_name: &str,
        scope: &Scope,
        config: ConfigMap,
    ) -> Result<(), RuntimeError> {
        self.rows
            .write()
            .await
            .insert((plugin_name.to_string(), scope.clone()), config);
        Ok(())
    }
}

/// Provider backed by one TOML file per plugin and scope:
/// `<root>/<scope>/<plugin>.toml`
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    root: PathBuf,
}

impl FileConfigProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Provider rooted at the user's plugin config directory
    pub fn user_default() -> Self {
        Self::new(agentry_paths::plugin_config_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, plugin_name: &str, scope: &Scope) -> Result<PathBuf, RuntimeError> {
        validate_plugin_name(plugin_name)?;
        Ok(self
            .root
            .join(scope.dir_name())
            .join(format!("{plugin_name}.toml")))
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn get_config(&self, plugin_name: &str, scope: &Scope) -> Result<ConfigMap, RuntimeError> {
        let path = self.path_for(plugin_name, scope)?;
        if !tokio::fs::try_exists(&path).await? {
            return Ok(ConfigMap::new());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let table: toml::Table =
            toml::from_str(&content).map_err(|e| RuntimeError::Config(e.to_string()))?;
        match serde_json::to_value(table).map_err(|e| RuntimeError::Config(e.to_string()))? {
            Value::Object(map) => Ok(map),
            _ => Ok(ConfigMap::new()),
        }
    }

    async fn put_config(
        &self,
        plugin_name: &str,
        scope: &Scope,
        config: ConfigMap,
    ) -> Result<(), RuntimeError> {
        let path = self.path_for(plugin_name, scope)?;
        let table = toml::Value::try_from(Value::Object(config))
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        let content =
            toml::to_string_pretty(&table).map_err(|e| RuntimeError::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}

/// Plugin names become file names, so reject anything path-like
pub(crate) fn validate_plugin_name(name: &str) -> Result<(), RuntimeError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(RuntimeError::Config(format!("invalid plugin name '{name}'")))
    }
}
