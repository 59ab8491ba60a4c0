use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use agentry_core::plugins::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_EXECUTION_TIMEOUT, DEFAULT_MAX_CONCURRENT_EXECUTIONS,
    PluginRuntimeConfig,
};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAgentryConfig {
    #[serde(default)]
    pub runtime: RawRuntimeConfig,

    #[serde(default)]
    pub plugins: RawPluginsConfig,
}

/// Runtime section as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRuntimeConfig {
    pub default_timeout_ms: Option<u64>,
    pub max_concurrent_executions: Option<usize>,
    pub drain_timeout_ms: Option<u64>,
    pub data_dir: Option<PathBuf>,
}

/// Plugins section as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPluginsConfig {
    /// Where plugin config rows and `enabled.toml` live
    pub config_dir: Option<PathBuf>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AgentryConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Execute deadline when a call names none
    pub default_timeout_ms: u64,

    /// Execute calls allowed to run at once
    pub max_concurrent_executions: usize,

    /// Upper bound on waiting for in-flight calls during unload
    pub drain_timeout_ms: u64,

    /// Root of per-scope plugin data
    pub data_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_EXECUTION_TIMEOUT.as_millis() as u64,
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT.as_millis() as u64,
            data_dir: agentry_paths::plugin_data_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginsConfig {
    pub config_dir: PathBuf,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            config_dir: agentry_paths::plugin_config_dir(),
        }
    }
}

impl PluginsConfig {
    pub fn enabled_path(&self) -> PathBuf {
        agentry_paths::enabled_file(&self.config_dir)
    }
}

impl AgentryConfig {
    /// Knobs for the plugin registry
    pub fn runtime_config(&self) -> PluginRuntimeConfig {
        PluginRuntimeConfig {
            default_timeout: Duration::from_millis(self.runtime.default_timeout_ms),
            max_concurrent_executions: self.runtime.max_concurrent_executions,
            drain_timeout: Duration::from_millis(self.runtime.drain_timeout_ms),
            data_dir: self.runtime.data_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = AgentryConfig::default();
        assert_eq!(config.runtime.default_timeout_ms, 30_000);
        assert_eq!(config.runtime.max_concurrent_executions, 64);
        assert_eq!(config.runtime.drain_timeout_ms, 60_000);
        assert!(config.plugins.config_dir.ends_with("plugins"));
    }

    #[test]
    fn test_runtime_config_conversion() {
        let config = AgentryConfig {
            runtime: RuntimeConfig {
                default_timeout_ms: 1500,
                max_concurrent_executions: 4,
                drain_timeout_ms: 250,
                data_dir: PathBuf::from("/var/lib/agentry"),
            },
            ..Default::default()
        };

        let runtime = config.runtime_config();
        assert_eq!(runtime.default_timeout, Duration::from_millis(1500));
        assert_eq!(runtime.max_concurrent_executions, 4);
        assert_eq!(runtime.drain_timeout, Duration::from_millis(250));
        assert_eq!(runtime.data_dir, PathBuf::from("/var/lib/agentry"));
    }

    #[test]
    fn test_raw_config_partial_parsing() {
        let toml_str = r#"
[runtime]
default_timeout_ms = 5000
"#;
        let raw: RawAgentryConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(raw.runtime.default_timeout_ms, Some(5000));
        assert!(raw.runtime.drain_timeout_ms.is_none());
        assert!(raw.plugins.config_dir.is_none());
    }

    #[test]
    fn test_raw_config_empty_uses_none() {
        let raw: RawAgentryConfig = toml::from_str("").unwrap();
        assert!(raw.runtime.default_timeout_ms.is_none());
        assert!(raw.runtime.max_concurrent_executions.is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AgentryConfig {
            plugins: PluginsConfig {
                config_dir: PathBuf::from("/etc/agentry/plugins"),
            },
            ..Default::default()
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AgentryConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(
            parsed.plugins.enabled_path(),
            PathBuf::from("/etc/agentry/plugins/enabled.toml")
        );
    }
}
