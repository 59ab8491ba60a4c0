//! PluginRegistry - owns live plugin instances and their lifecycle
//!
//! Instances are keyed by `(name, scope)`. Load, unload and reload on one
//! key are serialized by a per-key lock; different keys proceed in
//! parallel. `execute` never takes the key lock: it is admitted or rejected
//! by the instance's own lifecycle state, and unload drains every admitted
//! call before the shutdown hook runs.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use agentry_plugin_api::{
    InstanceKey, LogSink, MetricsSink, Payload, Plugin, PluginDescriptor, PluginError,
    PluginRequest, Scope,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;

use super::config::{ConfigProvider, validate_plugin_name};
use super::context::ContextBuilder;
use super::error::{LoadCause, RuntimeError};
use super::guard::{
    DEFAULT_EXECUTION_TIMEOUT, DEFAULT_MAX_CONCURRENT_EXECUTIONS, ExecutionGuard, Invocation,
};
use super::loader::PluginLoader;
use super::metrics::{InstanceMetrics, MetricsSnapshot};
use super::sinks::{TracingLogSink, TracingMetricsSink};

/// Default upper bound on waiting for in-flight calls during unload
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Runtime knobs for a [`PluginRegistry`]
#[derive(Debug, Clone, PartialEq)]
pub struct PluginRuntimeConfig {
    /// Execute deadline when the caller gives none. Also bounds the
    /// initialize and shutdown hooks.
    pub default_timeout: Duration,
    /// Execute calls allowed to run at once across all instances
    pub max_concurrent_executions: usize,
    /// How long unload waits for in-flight calls before shutting down anyway
    pub drain_timeout: Duration,
    /// Root of the per-scope plugin data directories
    pub data_dir: PathBuf,
}

impl Default for PluginRuntimeConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_EXECUTION_TIMEOUT,
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            data_dir: agentry_paths::plugin_data_dir(),
        }
    }
}

/// Health of an initialized instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Unhealthy,
}

/// Lifecycle state of a plugin instance.
///
/// Transitions only move forward; `Shutdown` is terminal. `Unloaded` and
/// `Loading` are never observed on a registered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unloaded,
    Loading,
    Initialized(Health),
    Draining,
    Shutdown,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => write!(f, "unloaded"),
            Self::Loading => write!(f, "loading"),
            Self::Initialized(Health::Healthy) => write!(f, "healthy"),
            Self::Initialized(Health::Unhealthy) => write!(f, "unhealthy"),
            Self::Draining => write!(f, "draining"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Snapshot of one registered instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub scope: Scope,
    pub implementation: String,
    pub state: LifecycleState,
    pub healthy: bool,
    pub loaded_at: DateTime<Utc>,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Draining,
    Shutdown,
}

/// A registered instance. Owned by the registry entry for its key.
struct LiveInstance {
    key: InstanceKey,
    implementation: String,
    plugin: Arc<dyn Plugin>,
    descriptor: PluginDescriptor,
    metrics: InstanceMetrics,
    loaded_at: DateTime<Utc>,
    /// Set when execute panicked
    faulted: AtomicBool,
    phase: StdMutex<Phase>,
    in_flight: TaskTracker,
}

impl LiveInstance {
    fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_healthy(&self) -> bool {
        !self.faulted.load(Ordering::Acquire) && self.plugin.is_healthy()
    }

    fn state(&self) -> LifecycleState {
        match self.phase() {
            Phase::Active if self.is_healthy() => LifecycleState::Initialized(Health::Healthy),
            Phase::Active => LifecycleState::Initialized(Health::Unhealthy),
            Phase::Draining => LifecycleState::Draining,
            Phase::Shutdown => LifecycleState::Shutdown,
        }
    }

    /// Admit one execute call. The token keeps unload waiting until dropped.
    fn admit(&self) -> Result<TaskTrackerToken, RuntimeError> {
        let phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        match *phase {
            Phase::Active if self.is_healthy() => Ok(self.in_flight.token()),
            Phase::Active => Err(RuntimeError::Unhealthy {
                key: self.key.clone(),
            }),
            Phase::Draining | Phase::Shutdown => Err(RuntimeError::not_found(&self.key)),
        }
    }

    /// Stop admitting calls
    fn begin_drain(&self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        *phase = Phase::Draining;
        self.in_flight.close();
    }

    fn finish(&self) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = Phase::Shutdown;
    }

    fn info(&self) -> PluginInfo {
        let state = self.state();
        PluginInfo {
            name: self.key.name.clone(),
            version: self.descriptor.version.clone(),
            description: self.descriptor.description.clone(),
            scope: self.key.scope.clone(),
            implementation: self.implementation.clone(),
            state,
            healthy: state == LifecycleState::Initialized(Health::Healthy),
            loaded_at: self.loaded_at,
            metrics: self.metrics.snapshot(),
        }
    }
}

/// Read-only handle to a live instance returned by [`PluginRegistry::get`]
#[derive(Clone)]
pub struct PluginHandle {
    instance: Arc<LiveInstance>,
}

impl PluginHandle {
    pub fn key(&self) -> &InstanceKey {
        &self.instance.key
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.instance.descriptor
    }

    pub fn state(&self) -> LifecycleState {
        self.instance.state()
    }

    pub fn is_healthy(&self) -> bool {
        self.instance.is_healthy()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.instance.metrics.snapshot()
    }

    pub fn info(&self) -> PluginInfo {
        self.instance.info()
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("key", &self.instance.key)
            .field("state", &self.instance.state())
            .finish()
    }
}

type KeyLocks = StdMutex<HashMap<InstanceKey, Arc<Mutex<()>>>>;

/// Exclusive hold on one key. The lock entry is pruned when nobody else
/// is waiting for it.
struct KeyLock<'a> {
    locks: &'a KeyLocks,
    key: InstanceKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(guard) = self.guard.take() {
            let mutex = OwnedMutexGuard::mutex(&guard).clone();
            drop(guard);
            // The map and `mutex` are the only remaining holders.
            if Arc::strong_count(&mutex) == 2 {
                locks.remove(&self.key);
            }
        }
    }
}

/// Concurrent store of live plugin instances.
///
/// Construct one per process (or per test) and share it behind an `Arc`.
pub struct PluginRegistry {
    loader: PluginLoader,
    contexts: ContextBuilder,
    guard: ExecutionGuard,
    config: PluginRuntimeConfig,
    instances: RwLock<HashMap<InstanceKey, Arc<LiveInstance>>>,
    key_locks: KeyLocks,
}

impl PluginRegistry {
    /// A registry logging and recording metrics through `tracing`
    pub fn new(
        loader: PluginLoader,
        provider: Arc<dyn ConfigProvider>,
        config: PluginRuntimeConfig,
    ) -> Self {
        Self::with_sinks(
            loader,
            provider,
            Arc::new(TracingLogSink),
            Arc::new(TracingMetricsSink),
            config,
        )
    }

    pub fn with_sinks(
        loader: PluginLoader,
        provider: Arc<dyn ConfigProvider>,
        log: Arc<dyn LogSink>,
        metrics: Arc<dyn MetricsSink>,
        config: PluginRuntimeConfig,
    ) -> Self {
        let guard = ExecutionGuard::new(
            config.max_concurrent_executions,
            config.default_timeout,
            metrics.clone(),
        );
        let contexts = ContextBuilder::new(provider, log, metrics, config.data_dir.clone());
        Self {
            loader,
            contexts,
            guard,
            config,
            instances: RwLock::new(HashMap::new()),
            key_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    pub fn provider(&self) -> &Arc<dyn ConfigProvider> {
        self.contexts.provider()
    }

    pub fn config(&self) -> &PluginRuntimeConfig {
        &self.config
    }

    async fn lock_key(&self, key: &InstanceKey) -> KeyLock<'_> {
        let mutex = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        KeyLock {
            locks: &self.key_locks,
            key: key.clone(),
            guard: Some(mutex.lock_owned().await),
        }
    }

    async fn entry(&self, key: &InstanceKey) -> Option<Arc<LiveInstance>> {
        self.instances.read().await.get(key).cloned()
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    /// Load `implementation` as `name` in `scope`.
    ///
    /// An existing instance under the same key is unloaded first. On any
    /// failure no entry is left behind.
    pub async fn load(
        &self,
        name: &str,
        scope: Scope,
        implementation: &str,
    ) -> Result<PluginInfo, RuntimeError> {
        validate_plugin_name(name)?;
        let key = InstanceKey::new(name, scope);
        let _lock = self.lock_key(&key).await;

        if self.unload_locked(&key).await {
            tracing::info!(plugin = %key.name, scope = %key.scope, "Replaced existing plugin instance");
        }
        self.load_locked(key, implementation).await
    }

    async fn load_locked(
        &self,
        key: InstanceKey,
        implementation: &str,
    ) -> Result<PluginInfo, RuntimeError> {
        let plugin: Arc<dyn Plugin> = Arc::from(self.loader.instantiate(implementation)?);
        let descriptor = plugin.descriptor();
        let ctx = Arc::new(self.contexts.build(&key, &descriptor.schema).await);

        let init = {
            let plugin = plugin.clone();
            self.run_hook(&key, "initialize", async move { plugin.initialize(ctx).await })
                .await
        };
        if let Err(e) = init {
            tracing::warn!(
                plugin = %key.name,
                scope = %key.scope,
                error = %e,
                "Plugin failed to initialize"
            );
            let cleanup = {
                let plugin = plugin.clone();
                self.run_hook(&key, "shutdown", async move { plugin.shutdown().await })
                    .await
            };
            if let Err(cleanup) = cleanup {
                tracing::debug!(plugin = %key.name, error = %cleanup, "Cleanup after failed initialize errored");
            }
            return Err(RuntimeError::load(key.name, LoadCause::Initialize(e)));
        }

        let instance = Arc::new(LiveInstance {
            key: key.clone(),
            implementation: implementation.to_string(),
            plugin,
            descriptor,
            metrics: InstanceMetrics::new(),
            loaded_at: Utc::now(),
            faulted: AtomicBool::new(false),
            phase: StdMutex::new(Phase::Active),
            in_flight: TaskTracker::new(),
        });
        let info = instance.info();
        self.instances.write().await.insert(key.clone(), instance);

        tracing::info!(
            plugin = %key.name,
            scope = %key.scope,
            implementation = %implementation,
            version = %info.version,
            "Loaded plugin"
        );
        Ok(info)
    }

    /// Unload the instance under `(name, scope)`.
    ///
    /// Returns false when nothing was loaded. New executes are rejected
    /// from the moment this is called; in-flight ones finish (bounded by
    /// the drain timeout) before the shutdown hook runs.
    pub async fn unload(&self, name: &str, scope: Scope) -> bool {
        let key = InstanceKey::new(name, scope);
        let _lock = self.lock_key(&key).await;
        self.unload_locked(&key).await
    }

    async fn unload_locked(&self, key: &InstanceKey) -> bool {
        let Some(instance) = self.entry(key).await else {
            return false;
        };

        instance.begin_drain();
        tracing::debug!(plugin = %key.name, scope = %key.scope, "Draining plugin");

        let in_flight = instance.in_flight.len();
        if tokio::time::timeout(self.config.drain_timeout, instance.in_flight.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                plugin = %key.name,
                scope = %key.scope,
                in_flight,
                "Drain timed out, shutting down with calls still running"
            );
        }

        let plugin = instance.plugin.clone();
        if let Err(e) = self
            .run_hook(key, "shutdown", async move { plugin.shutdown().await })
            .await
        {
            tracing::warn!(plugin = %key.name, scope = %key.scope, error = %e, "Plugin shutdown failed");
        }

        instance.finish();
        self.instances.write().await.remove(key);
        tracing::info!(plugin = %key.name, scope = %key.scope, "Unloaded plugin");
        true
    }

    /// Unload and load again with the same implementation, under one key lock
    pub async fn reload(&self, name: &str, scope: Scope) -> Result<PluginInfo, RuntimeError> {
        let key = InstanceKey::new(name, scope);
        let _lock = self.lock_key(&key).await;

        let implementation = self
            .entry(&key)
            .await
            .map(|instance| instance.implementation.clone())
            .ok_or_else(|| RuntimeError::not_found(&key))?;

        self.unload_locked(&key).await;
        self.load_locked(key, &implementation).await
    }

    /// Unload every instance
    pub async fn shutdown_all(&self) {
        let keys: Vec<InstanceKey> = self.instances.read().await.keys().cloned().collect();
        tracing::info!(count = keys.len(), "Shutting down all plugins");
        for key in keys {
            let _lock = self.lock_key(&key).await;
            self.unload_locked(&key).await;
        }
    }

    /// Run an initialize or shutdown hook on its own task, bounded by the
    /// default timeout. Panics and timeouts become plugin errors.
    async fn run_hook<F>(&self, key: &InstanceKey, hook: &str, fut: F) -> Result<(), PluginError>
    where
        F: Future<Output = Result<(), PluginError>> + Send + 'static,
    {
        let task = tokio_util::task::AbortOnDropHandle::new(tokio::spawn(fut));
        match tokio::time::timeout(self.config.default_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) if join_error.is_panic() => Err(PluginError::failed(format!(
                "{hook} panicked for '{key}'"
            ))),
            Ok(Err(_)) => Err(PluginError::failed(format!("{hook} was cancelled"))),
            Err(_) => Err(PluginError::failed(format!(
                "{hook} timed out after {:?}",
                self.config.default_timeout
            ))),
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────

    /// The live instance under `(name, scope)`.
    ///
    /// Draining or shut-down instances are reported as not found.
    pub async fn get(&self, name: &str, scope: Scope) -> Result<PluginHandle, RuntimeError> {
        let key = InstanceKey::new(name, scope);
        match self.entry(&key).await {
            Some(instance) if instance.phase() == Phase::Active => Ok(PluginHandle { instance }),
            _ => Err(RuntimeError::not_found(&key)),
        }
    }

    /// Instances visible from `scope`, sorted by name then scope.
    ///
    /// An agent scope sees its own instances and the system ones.
    pub async fn list(&self, scope: &Scope) -> Vec<PluginInfo> {
        let mut infos: Vec<PluginInfo> = self
            .instances
            .read()
            .await
            .values()
            .filter(|instance| scope.sees(&instance.key.scope))
            .map(|instance| instance.info())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.scope.cmp(&b.scope)));
        infos
    }

    pub async fn metrics(&self, name: &str, scope: Scope) -> Result<MetricsSnapshot, RuntimeError> {
        let key = InstanceKey::new(name, scope);
        self.entry(&key)
            .await
            .map(|instance| instance.metrics.snapshot())
            .ok_or_else(|| RuntimeError::not_found(&key))
    }

    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }

    // ─── Execution ───────────────────────────────────────────────────

    /// Execute `request` on the instance under `(name, scope)`.
    ///
    /// `timeout` overrides the configured default. A panic inside the
    /// variant marks the instance unhealthy until it is reloaded.
    pub async fn execute(
        &self,
        name: &str,
        scope: Scope,
        request: PluginRequest,
        timeout: Option<Duration>,
    ) -> Result<Payload, RuntimeError> {
        let key = InstanceKey::new(name, scope);
        let instance = self
            .entry(&key)
            .await
            .ok_or_else(|| RuntimeError::not_found(&key))?;
        let _admitted = instance.admit()?;

        let guarded = self
            .guard
            .execute(
                Invocation {
                    key: &key,
                    plugin: instance.plugin.clone(),
                    metrics: &instance.metrics,
                },
                request,
                timeout,
            )
            .await;

        if guarded.panicked && !instance.faulted.swap(true, Ordering::AcqRel) {
            tracing::warn!(plugin = %key.name, scope = %key.scope, "Plugin marked unhealthy after panic");
        }
        guarded.result
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("loader", &self.loader)
            .field("guard", &self.guard)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
