//! Plugin runtime error types

use std::time::Duration;

use agentry_plugin_api::{ErrorKind, InstanceKey, PluginError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a load attempt failed
#[derive(Error, Debug)]
pub enum LoadCause {
    /// No provider registered under the implementation reference
    #[error("unknown implementation '{0}'")]
    UnknownImplementation(String),

    /// The provider failed to build an instance, or built an invalid one
    #[error("construction failed: {0}")]
    Construction(String),

    /// The variant's initialize hook failed
    #[error("initialize failed: {0}")]
    Initialize(#[source] PluginError),
}

/// Errors surfaced by the plugin runtime
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Resolution, construction, or initialize failure. No entry was registered.
    #[error("Failed to load plugin '{name}': {cause}")]
    Load {
        name: String,
        #[source]
        cause: LoadCause,
    },

    /// No live instance under the key
    #[error("Plugin '{key}' not found")]
    NotFound { key: InstanceKey },

    /// The instance reports itself unhealthy
    #[error("Plugin '{key}' is unhealthy")]
    Unhealthy { key: InstanceKey },

    /// The execution guard deadline was exceeded
    #[error("Plugin '{key}' timed out after {timeout:?}")]
    Timeout { key: InstanceKey, timeout: Duration },

    /// The variant failed unexpectedly during execute
    #[error("Plugin '{key}' failed: {message}")]
    Execution { key: InstanceKey, message: String },

    /// The variant rejected its input
    #[error("Validation error: {0}")]
    Validation(String),

    /// The input was outside the operation's domain
    #[error("Domain error: {0}")]
    Domain(String),

    /// Configuration or provider registration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error from a file-backed collaborator
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn load(name: impl Into<String>, cause: LoadCause) -> Self {
        Self::Load {
            name: name.into(),
            cause,
        }
    }

    pub fn not_found(key: &InstanceKey) -> Self {
        Self::NotFound { key: key.clone() }
    }

    /// Map a variant-level error raised during execute
    pub fn from_plugin(key: &InstanceKey, error: PluginError) -> Self {
        match error {
            PluginError::Validation(m) => Self::Validation(m),
            PluginError::Domain(m) => Self::Domain(m),
            other => Self::Execution {
                key: key.clone(),
                message: other.to_string(),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Load { .. } => ErrorKind::Load,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unhealthy { .. } => ErrorKind::Unhealthy,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Domain(_) => ErrorKind::Domain,
            Self::Config(_) | Self::Io(_) => ErrorKind::Config,
        }
    }

    /// Structured `{kind, message}` form for callers
    pub fn report(&self) -> ErrorReport {
        let message = match self {
            Self::Validation(m) | Self::Domain(m) => m.clone(),
            other => other.to_string(),
        };
        ErrorReport {
            kind: self.kind(),
            message,
        }
    }
}

/// Caller-facing failure: kind plus message, never a backtrace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}
