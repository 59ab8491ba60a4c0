//! Filesystem layout for agentry.
//!
//! ```text
//! $XDG_CONFIG_HOME/agentry/
//!     config.toml                  runtime settings for the CLI
//!     plugins/enabled.toml         enabled flags, scope -> plugin names
//!     plugins/<scope>/<name>.toml  per-scope plugin configuration rows
//! $XDG_DATA_HOME/agentry/
//!     plugins/<scope>/<name>/      per-instance plugin data
//! ```
//!
//! XDG variables are honored on every platform; without them the usual
//! `~/.config` and `~/.local/share` locations are used.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "agentry";
const PLUGINS_DIR: &str = "plugins";
const ENABLED_FILE: &str = "enabled.toml";
const CONFIG_FILE: &str = "config.toml";

fn xdg_dir(var: &str, home_relative: &str) -> PathBuf {
    let base = match std::env::var_os(var) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => match dirs::home_dir() {
            Some(home) => home.join(home_relative),
            None => PathBuf::from(home_relative),
        },
    };
    base.join(APP_DIR)
}

/// Root of agentry's configuration, `$XDG_CONFIG_HOME/agentry`.
pub fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// Root of agentry's data, `$XDG_DATA_HOME/agentry`.
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

/// The user-level CLI settings file.
///
/// ```
/// let path = agentry_paths::user_config_file();
/// assert!(path.ends_with("agentry/config.toml"));
/// ```
pub fn user_config_file() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Directory holding plugin configuration rows and the enabled-flag file.
pub fn plugin_config_dir() -> PathBuf {
    config_dir().join(PLUGINS_DIR)
}

/// Root directory for per-scope plugin data.
pub fn plugin_data_dir() -> PathBuf {
    data_dir().join(PLUGINS_DIR)
}

/// The enabled-flag file inside a plugin config directory.
///
/// ```
/// use std::path::Path;
///
/// let path = agentry_paths::enabled_file(Path::new("/etc/agentry/plugins"));
/// assert_eq!(path, Path::new("/etc/agentry/plugins/enabled.toml"));
/// ```
pub fn enabled_file(plugin_config_dir: &Path) -> PathBuf {
    plugin_config_dir.join(ENABLED_FILE)
}
