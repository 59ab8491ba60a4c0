//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use agentry_core::plugins::{
    ConfigProvider, MemoryConfigProvider, PluginLoader, PluginRegistry, PluginRuntimeConfig,
};
use agentry_plugin_api::{
    ConfigSchema, Payload, Plugin, PluginContext, PluginError, PluginManifest, PluginRequest,
    PluginResult, async_trait,
};
use serde_json::Value;

/// Counters a [`Probe`] reports into, shared with the test body
#[derive(Debug, Default)]
pub struct ProbeState {
    pub executions: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub initialized: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub shutdown_started: AtomicBool,
    pub in_flight_at_shutdown: AtomicUsize,
    pub executes_after_shutdown: AtomicUsize,
    pub fail_initialize: AtomicBool,
    pub fail_shutdown: AtomicBool,
    pub panic_on_shutdown: AtomicBool,
    pub hang_on_shutdown: AtomicBool,
    pub init_delay_ms: AtomicUsize,
}

impl ProbeState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Instrumented plugin. `execute` sleeps for the request's `sleep_ms`.
pub struct Probe {
    state: Arc<ProbeState>,
    healthy: AtomicBool,
}

impl Probe {
    pub fn new(state: Arc<ProbeState>) -> Self {
        Self {
            state,
            healthy: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Plugin for Probe {
    fn manifest(&self) -> PluginManifest {
        PluginManifest::new("probe", "0.1.0", "Instrumented test plugin")
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::empty()
    }

    async fn initialize(&self, _ctx: Arc<PluginContext>) -> Result<(), PluginError> {
        let delay = self.state.init_delay_ms.load(Ordering::SeqCst) as u64;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.state.fail_initialize.load(Ordering::SeqCst) {
            return Err(PluginError::config("probe refuses to start"));
        }
        self.state.initialized.fetch_add(1, Ordering::SeqCst);
        self.healthy.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(&self, request: PluginRequest) -> PluginResult {
        if self.state.shutdown_started.load(Ordering::SeqCst) {
            self.state.executes_after_shutdown.fetch_add(1, Ordering::SeqCst);
        }
        let _in_flight = InFlight::enter(&self.state.in_flight);

        let sleep_ms = request.get("sleep_ms").and_then(Value::as_u64).unwrap_or(0);
        if sleep_ms > 0 {
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }

        let count = self.state.executions.fetch_add(1, Ordering::SeqCst) + 1;
        let mut payload = Payload::new();
        payload.insert("count".to_string(), count.into());
        Ok(payload)
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        self.state.shutdown_started.store(true, Ordering::SeqCst);
        self.state
            .in_flight_at_shutdown
            .store(self.state.in_flight.load(Ordering::SeqCst), Ordering::SeqCst);
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.healthy.store(false, Ordering::SeqCst);
        if self.state.panic_on_shutdown.load(Ordering::SeqCst) {
            panic!("probe shutdown panicked");
        }
        if self.state.hang_on_shutdown.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.state.fail_shutdown.load(Ordering::SeqCst) {
            return Err(PluginError::failed("probe shutdown failed"));
        }
        Ok(())
    }
}

/// Built-in loader plus a `probe` provider reporting into `state`
pub fn loader_with_probe(state: &Arc<ProbeState>) -> PluginLoader {
    let mut loader = PluginLoader::with_builtins();
    let state = state.clone();
    loader
        .register_fn("probe", move || Ok(Box::new(Probe::new(state.clone()))))
        .unwrap();
    loader
}

pub fn runtime_config() -> PluginRuntimeConfig {
    PluginRuntimeConfig {
        default_timeout: Duration::from_secs(5),
        max_concurrent_executions: 256,
        drain_timeout: Duration::from_secs(5),
        data_dir: PathBuf::from("/tmp/agentry-integration"),
    }
}

pub fn registry_with(loader: PluginLoader, config: PluginRuntimeConfig) -> Arc<PluginRegistry> {
    let provider: Arc<dyn ConfigProvider> = Arc::new(MemoryConfigProvider::new());
    Arc::new(PluginRegistry::new(loader, provider, config))
}

pub fn request(value: Value) -> PluginRequest {
    value.as_object().cloned().unwrap()
}
