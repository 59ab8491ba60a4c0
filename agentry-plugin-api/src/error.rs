//! Error types for plugin authors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that a plugin variant can return from its hooks
#[derive(Error, Debug)]
pub enum PluginError {
    /// The request or configuration failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The input was well-formed but outside the operation's domain
    #[error("Domain error: {0}")]
    Domain(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected failure inside the plugin
    #[error("{0}")]
    Failed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PluginError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a domain error
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an unexpected-failure error
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// The message without the display prefix
    pub fn message(&self) -> String {
        match self {
            Self::Validation(m)
            | Self::Domain(m)
            | Self::Config(m)
            | Self::Failed(m)
            | Self::Serialization(m) => m.clone(),
            Self::Io(e) => e.to_string(),
        }
    }

    /// Map onto the caller-facing error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Domain(_) => ErrorKind::Domain,
            Self::Config(_) => ErrorKind::Config,
            Self::Failed(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::Execution,
        }
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Kind of a failure as surfaced to callers and metrics sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Load,
    NotFound,
    Unhealthy,
    Timeout,
    Execution,
    Validation,
    Domain,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::NotFound => "not_found",
            Self::Unhealthy => "unhealthy",
            Self::Timeout => "timeout",
            Self::Execution => "execution",
            Self::Validation => "validation",
            Self::Domain => "domain",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
