//! agentry-plugin-api - Capability interface for agentry plugins
//!
//! Every plugin variant implements [`Plugin`]. The runtime resolves a variant
//! by name, hands it a [`PluginContext`] during `initialize`, invokes
//! `execute` behind a timeout, and calls `shutdown` once all in-flight calls
//! have drained.
//!
//! # Example
//!
//! ```ignore
//! use agentry_plugin_api::*;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! pub struct Shout {
//!     state: Lifecycle,
//! }
//!
//! #[async_trait]
//! impl Plugin for Shout {
//!     fn manifest(&self) -> PluginManifest {
//!         PluginManifest::new("shout", "0.1.0", "Upper-cases a message")
//!     }
//!
//!     fn config_schema(&self) -> ConfigSchema {
//!         ConfigSchema::empty()
//!     }
//!
//!     async fn initialize(&self, ctx: Arc<PluginContext>) -> Result<(), PluginError> {
//!         self.state.initialize(ctx);
//!         Ok(())
//!     }
//!
//!     async fn execute(&self, request: PluginRequest) -> PluginResult {
//!         let message = request.require_str("message")?;
//!         let mut payload = Payload::new();
//!         payload.insert("response".into(), message.to_uppercase().into());
//!         Ok(payload)
//!     }
//!
//!     fn is_healthy(&self) -> bool {
//!         self.state.is_healthy()
//!     }
//!
//!     async fn shutdown(&self) -> Result<(), PluginError> {
//!         self.state.shutdown();
//!         Ok(())
//!     }
//! }
//! ```

pub mod context;
pub mod error;
pub mod lifecycle;
pub mod sink;
pub mod types;

pub use async_trait::async_trait;
pub use context::{PluginContext, ResolvedConfig};
pub use error::{ErrorKind, PluginError};
pub use lifecycle::Lifecycle;
pub use sink::{LogLevel, LogSink, MetricsSink};
pub use types::*;

use std::sync::Arc;

/// The capability interface every plugin variant implements.
///
/// Hooks take `&self`: the runtime may call `execute` concurrently once the
/// instance is initialized, so variants with mutable state synchronize it
/// themselves.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Identity of the variant
    fn manifest(&self) -> PluginManifest;

    /// Declared configuration options.
    ///
    /// Variants without options return [`ConfigSchema::empty()`].
    fn config_schema(&self) -> ConfigSchema;

    /// Called once after the context has been built
    async fn initialize(&self, ctx: Arc<PluginContext>) -> Result<(), PluginError>;

    /// Run one request
    async fn execute(&self, request: PluginRequest) -> PluginResult;

    /// True once initialized and until shut down
    fn is_healthy(&self) -> bool;

    /// Release resources. Must be idempotent.
    async fn shutdown(&self) -> Result<(), PluginError>;

    /// Manifest and schema together
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new(self.manifest(), self.config_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_trait_is_object_safe() {
        fn _takes_boxed_plugin(_: Box<dyn Plugin>) {}
        fn _takes_shared_plugin(_: Arc<dyn Plugin>) {}
    }
}
