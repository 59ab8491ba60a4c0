//! Test doubles shared by the unit tests

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agentry_plugin_api::{
    ConfigSchema, InstanceKey, Lifecycle, Payload, Plugin, PluginContext, PluginError,
    PluginManifest, PluginRequest, PluginResult, Scope, async_trait,
};
use serde_json::Value;

use super::context::resolve;
use super::sinks::{MemoryMetricsSink, TracingLogSink};

/// A system-scoped context for `name` with `config` merged over the schema
pub fn context_with(name: &str, schema: &ConfigSchema, config: Value) -> Arc<PluginContext> {
    let provided = config.as_object().cloned().unwrap_or_default();
    Arc::new(PluginContext::new(
        InstanceKey::new(name, Scope::System),
        resolve(schema, &provided),
        PathBuf::from("/tmp/agentry-test"),
        Arc::new(TracingLogSink),
        Arc::new(MemoryMetricsSink::new()),
    ))
}

/// What a [`ScriptedPlugin`] does on every execute call
pub enum Script {
    Respond(Value),
    Fail(PluginError),
    Sleep(Duration),
    Panic(&'static str),
}

/// Plugin whose execute behaviour is fixed up front
pub struct ScriptedPlugin {
    script: Script,
    state: Lifecycle,
    pub executions: Arc<AtomicUsize>,
}

impl ScriptedPlugin {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            state: Lifecycle::new(),
            executions: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn replay(error: &PluginError) -> PluginError {
    match error {
        PluginError::Validation(m) => PluginError::validation(m.clone()),
        PluginError::Domain(m) => PluginError::domain(m.clone()),
        PluginError::Config(m) => PluginError::config(m.clone()),
        other => PluginError::failed(other.to_string()),
    }
}

#[async_trait]
impl Plugin for ScriptedPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("scripted", "0.0.1", "Test double")
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::empty()
    }

    async fn initialize(&self, ctx: Arc<PluginContext>) -> Result<(), PluginError> {
        self.state.initialize(ctx);
        Ok(())
    }

    async fn execute(&self, _request: PluginRequest) -> PluginResult {
        self.executions.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Respond(value) => Ok(value.as_object().cloned().unwrap_or_else(Payload::new)),
            Script::Fail(error) => Err(replay(error)),
            Script::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Payload::new())
            }
            Script::Panic(message) => panic!("{}", message),
        }
    }

    fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        self.state.shutdown();
        Ok(())
    }
}
