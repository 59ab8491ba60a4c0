//! agentry-core: plugin execution runtime for agentry agents
//!
//! Agents load capability plugins at runtime, configure them per scope,
//! invoke them behind a timeout, and unload them with a graceful drain.
//! See [`plugins`] for the moving parts.

pub mod plugins;

pub use plugins::{
    ConfigProvider, EnablementStore, LifecycleState, PluginInfo, PluginLoader, PluginRegistry,
    PluginRuntimeConfig, PluginService, RuntimeError, TestReport,
};
