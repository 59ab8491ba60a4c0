//! Plugin execution runtime
//!
//! - [`PluginLoader`]: closed map of implementation references to factories
//! - [`ContextBuilder`]: merges schema defaults with a [`ConfigProvider`]'s values
//! - [`PluginRegistry`]: live instances keyed by `(name, scope)`, with their lifecycle
//! - [`ExecutionGuard`]: timeout and failure isolation around each execute call
//! - [`PluginService`]: enable/disable/test/config operations for callers
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded -> Loading -> Initialized(Healthy|Unhealthy) -> Draining -> Shutdown
//! ```
//!
//! Loading over a live key unloads the old instance first. Unload rejects
//! new executes immediately, waits for in-flight ones, then calls the
//! variant's shutdown hook.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use agentry_core::plugins::{
//!     MemoryConfigProvider, PluginLoader, PluginRegistry, PluginRuntimeConfig,
//! };
//! use agentry_plugin_api::Scope;
//!
//! # async fn example() -> Result<(), agentry_core::plugins::RuntimeError> {
//! let registry = PluginRegistry::new(
//!     PluginLoader::with_builtins(),
//!     Arc::new(MemoryConfigProvider::new()),
//!     PluginRuntimeConfig::default(),
//! );
//!
//! registry.load("echo", Scope::agent("42"), "echo").await?;
//!
//! let mut request = serde_json::Map::new();
//! request.insert("message".into(), "Hello, World!".into());
//! let payload = registry.execute("echo", Scope::agent("42"), request, None).await?;
//! assert_eq!(payload["response"], "Echo: Hello, World!");
//!
//! registry.unload("echo", Scope::agent("42")).await;
//! # Ok(())
//! # }
//! ```

pub mod builtin;
mod config;
mod context;
mod enablement;
mod error;
mod guard;
mod loader;
mod metrics;
mod registry;
mod service;
mod sinks;

#[cfg(test)]
mod testing;

pub use config::{ConfigMap, ConfigProvider, FileConfigProvider, MemoryConfigProvider};
pub use context::{ContextBuilder, resolve};
pub use enablement::{
    EnabledPlugins, EnablementStore, FileEnablementStore, MemoryEnablementStore,
};
pub use error::{ErrorReport, LoadCause, RuntimeError};
pub use guard::{
    DEFAULT_EXECUTION_TIMEOUT, DEFAULT_MAX_CONCURRENT_EXECUTIONS, ExecutionGuard, Guarded,
    Invocation,
};
pub use loader::{PluginFactory, PluginLoader};
pub use metrics::{InstanceMetrics, MetricsSnapshot};
pub use registry::{
    DEFAULT_DRAIN_TIMEOUT, Health, LifecycleState, PluginHandle, PluginInfo, PluginRegistry,
    PluginRuntimeConfig,
};
pub use service::{AvailablePlugin, PluginService, RestoreReport, TestReport};
pub use sinks::{MemoryMetricsSink, TracingLogSink, TracingMetricsSink};
