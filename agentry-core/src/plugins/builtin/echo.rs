//! Echo - returns the message with a configurable prefix

use std::sync::Arc;

use agentry_plugin_api::{
    ConfigSchema, Lifecycle, Payload, Plugin, PluginContext, PluginError, PluginManifest,
    PluginRequest, PluginResult, RequestExt, ValueType, async_trait,
};

pub const DEFAULT_PREFIX: &str = "Echo: ";

#[derive(Debug, Default)]
pub struct EchoPlugin {
    state: Lifecycle,
}

impl EchoPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn prefix(&self) -> String {
        self.state
            .context()
            .map(|ctx| ctx.config().get_str("prefix", DEFAULT_PREFIX))
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string())
    }
}

#[async_trait]
impl Plugin for EchoPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("echo", "1.0.0", "Echoes the message back with a prefix")
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::empty().option(
            "prefix",
            ValueType::String,
            DEFAULT_PREFIX,
            "Text prepended to every response",
        )
    }

    async fn initialize(&self, ctx: Arc<PluginContext>) -> Result<(), PluginError> {
        if !self.state.initialize(ctx.clone()) {
            return Err(PluginError::failed("echo is already initialized"));
        }
        ctx.log_debug("initialized");
        Ok(())
    }

    async fn execute(&self, request: PluginRequest) -> PluginResult {
        let message = request.require_str("message")?;
        let mut payload = Payload::new();
        payload.insert(
            "response".to_string(),
            format!("{}{}", self.prefix(), message).into(),
        );
        Ok(payload)
    }

    fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        if self.state.shutdown() {
            if let Some(ctx) = self.state.context() {
                ctx.log_debug("shut down");
            }
        }
        Ok(())
    }
}
