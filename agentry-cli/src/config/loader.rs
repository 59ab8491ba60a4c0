use super::types::{
    AgentryConfig, PluginsConfig, RawAgentryConfig, RawPluginsConfig, RawRuntimeConfig,
    RuntimeConfig,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<AgentryConfig> {
        Self::load_layers(&Self::user_config_path(), &Self::project_config_path())
    }

    /// Merge `user` then `project`, skipping files that do not exist
    pub fn load_layers(user: &Path, project: &Path) -> Result<AgentryConfig> {
        let mut raw = RawAgentryConfig::default();

        // Layer 1: User config
        if let Some(user_config) = Self::read_raw(user)? {
            raw = Self::merge_raw(raw, user_config);
        }

        // Layer 2: Project config
        if let Some(project_config) = Self::read_raw(project)? {
            raw = Self::merge_raw(raw, project_config);
        }

        Ok(Self::finalize(raw))
    }

    fn read_raw(path: &Path) -> Result<Option<RawAgentryConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config layer");
        Ok(Some(raw))
    }

    /// User config path (`$XDG_CONFIG_HOME/agentry/config.toml`)
    pub fn user_config_path() -> PathBuf {
        agentry_paths::user_config_file()
    }

    /// Get project config path
    /// Can be overridden with AGENTRY_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("AGENTRY_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".agentry/config.toml")
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawAgentryConfig, overlay: RawAgentryConfig) -> RawAgentryConfig {
        RawAgentryConfig {
            runtime: RawRuntimeConfig {
                default_timeout_ms: overlay
                    .runtime
                    .default_timeout_ms
                    .or(base.runtime.default_timeout_ms),
                max_concurrent_executions: overlay
                    .runtime
                    .max_concurrent_executions
                    .or(base.runtime.max_concurrent_executions),
                drain_timeout_ms: overlay
                    .runtime
                    .drain_timeout_ms
                    .or(base.runtime.drain_timeout_ms),
                data_dir: overlay.runtime.data_dir.or(base.runtime.data_dir),
            },
            plugins: RawPluginsConfig {
                config_dir: overlay.plugins.config_dir.or(base.plugins.config_dir),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawAgentryConfig) -> AgentryConfig {
        let runtime = RuntimeConfig::default();
        AgentryConfig {
            runtime: RuntimeConfig {
                default_timeout_ms: raw
                    .runtime
                    .default_timeout_ms
                    .unwrap_or(runtime.default_timeout_ms),
                max_concurrent_executions: raw
                    .runtime
                    .max_concurrent_executions
                    .unwrap_or(runtime.max_concurrent_executions),
                drain_timeout_ms: raw
                    .runtime
                    .drain_timeout_ms
                    .unwrap_or(runtime.drain_timeout_ms),
                data_dir: raw.runtime.data_dir.unwrap_or(runtime.data_dir),
            },
            plugins: PluginsConfig {
                config_dir: raw
                    .plugins
                    .config_dir
                    .unwrap_or_else(|| PluginsConfig::default().config_dir),
            },
        }
    }
}
