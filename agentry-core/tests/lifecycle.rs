//! Lifecycle tests for PluginRegistry
//!
//! Load, unload, reload, and the health of registered instances, driven
//! through the public registry API.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use agentry_core::plugins::{
    ConfigProvider, FileConfigProvider, Health, LifecycleState, LoadCause, PluginLoader,
    PluginRegistry, PluginRuntimeConfig, RuntimeError,
};
use agentry_plugin_api::{ErrorKind, Scope};
use serde_json::json;
use tempfile::TempDir;

use common::{ProbeState, loader_with_probe, registry_with, request, runtime_config};

#[tokio::test]
async fn loaded_instance_is_healthy_until_unloaded() {
    let registry = registry_with(PluginLoader::with_builtins(), runtime_config());

    registry.load("echo", Scope::agent("1"), "echo").await.unwrap();
    let handle = registry.get("echo", Scope::agent("1")).await.unwrap();
    assert_eq!(handle.state(), LifecycleState::Initialized(Health::Healthy));

    registry.unload("echo", Scope::agent("1")).await;
    let err = registry.get("echo", Scope::agent("1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn reference_examples_through_the_registry() {
    let registry = registry_with(PluginLoader::with_builtins(), runtime_config());
    let scope = Scope::agent("7");
    registry.load("echo", scope.clone(), "echo").await.unwrap();
    registry.load("calculator", scope.clone(), "calculator").await.unwrap();

    let payload = registry
        .execute("echo", scope.clone(), request(json!({"message": "Hello, World!"})), None)
        .await
        .unwrap();
    assert_eq!(payload["response"], "Echo: Hello, World!");

    let payload = registry
        .execute("calculator", scope.clone(), request(json!({"operation": "4 + 5"})), None)
        .await
        .unwrap();
    assert_eq!(payload["result"], 9.0);

    let err = registry
        .execute("calculator", scope.clone(), request(json!({"operation": "10 / 0"})), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Domain(ref m) if m == "division by zero"));

    let err = registry
        .execute("calculator", scope, request(json!({"operation": "abc + 1"})), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn provider_config_reaches_the_variant() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(FileConfigProvider::new(dir.path()));
    provider
        .put_config(
            "echo",
            &Scope::System,
            json!({"prefix": "Custom: "}).as_object().cloned().unwrap(),
        )
        .await
        .unwrap();

    let registry = PluginRegistry::new(PluginLoader::with_builtins(), provider, runtime_config());
    registry.load("echo", Scope::System, "echo").await.unwrap();

    let payload = registry
        .execute("echo", Scope::System, request(json!({"message": "Test"})), None)
        .await
        .unwrap();
    assert_eq!(payload["response"], "Custom: Test");
}

#[tokio::test]
async fn loading_over_a_live_key_shuts_the_old_instance_down() {
    let state = ProbeState::new();
    let registry = registry_with(loader_with_probe(&state), runtime_config());

    registry.load("probe", Scope::System, "probe").await.unwrap();
    registry.load("probe", Scope::System, "probe").await.unwrap();

    assert_eq!(state.initialized.load(Ordering::SeqCst), 2);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len().await, 1);
    assert!(registry.get("probe", Scope::System).await.unwrap().is_healthy());
}

#[tokio::test]
async fn failed_initialize_leaves_no_entry() {
    let state = ProbeState::new();
    state.fail_initialize.store(true, Ordering::SeqCst);
    let registry = registry_with(loader_with_probe(&state), runtime_config());

    let err = registry.load("probe", Scope::System, "probe").await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Load {
            cause: LoadCause::Initialize(_),
            ..
        }
    ));
    assert!(registry.is_empty().await);
    assert!(registry.list(&Scope::System).await.is_empty());
}

#[tokio::test]
async fn panicking_cleanup_after_failed_initialize_is_a_load_error() {
    let state = ProbeState::new();
    state.fail_initialize.store(true, Ordering::SeqCst);
    state.panic_on_shutdown.store(true, Ordering::SeqCst);
    let registry = registry_with(loader_with_probe(&state), runtime_config());

    let outcome = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.load("probe", Scope::System, "probe").await })
            .await
    };
    let err = outcome.expect("load must not unwind").unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Load {
            cause: LoadCause::Initialize(_),
            ..
        }
    ));
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
    assert!(registry.is_empty().await);

    // The key lock was released despite the panic.
    state.fail_initialize.store(false, Ordering::SeqCst);
    state.panic_on_shutdown.store(false, Ordering::SeqCst);
    registry.load("probe", Scope::System, "probe").await.unwrap();
}

#[tokio::test]
async fn hung_cleanup_after_failed_initialize_is_bounded() {
    let state = ProbeState::new();
    state.fail_initialize.store(true, Ordering::SeqCst);
    state.hang_on_shutdown.store(true, Ordering::SeqCst);
    let config = PluginRuntimeConfig {
        default_timeout: Duration::from_millis(100),
        ..runtime_config()
    };
    let registry = registry_with(loader_with_probe(&state), config);

    let started = Instant::now();
    let err = registry.load("probe", Scope::System, "probe").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Load);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "load blocked on a hung cleanup: {:?}",
        started.elapsed()
    );
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn failed_load_does_not_disturb_other_instances() {
    let state = ProbeState::new();
    let registry = registry_with(loader_with_probe(&state), runtime_config());
    registry.load("echo", Scope::System, "echo").await.unwrap();

    state.fail_initialize.store(true, Ordering::SeqCst);
    assert!(registry.load("probe", Scope::System, "probe").await.is_err());
    assert!(registry.load("nope", Scope::System, "missing").await.is_err());

    assert!(registry.get("echo", Scope::System).await.unwrap().is_healthy());
}

#[tokio::test]
async fn shutdown_errors_still_remove_the_entry() {
    let state = ProbeState::new();
    state.fail_shutdown.store(true, Ordering::SeqCst);
    let registry = registry_with(loader_with_probe(&state), runtime_config());

    registry.load("probe", Scope::System, "probe").await.unwrap();
    assert!(registry.unload("probe", Scope::System).await);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn reload_builds_a_fresh_instance() {
    let state = ProbeState::new();
    let registry = registry_with(loader_with_probe(&state), runtime_config());
    registry.load("probe", Scope::agent("3"), "probe").await.unwrap();
    registry
        .execute("probe", Scope::agent("3"), request(json!({})), None)
        .await
        .unwrap();

    let info = registry.reload("probe", Scope::agent("3")).await.unwrap();
    assert!(info.healthy);
    assert_eq!(info.metrics.executions, 0);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);

    let err = registry.reload("probe", Scope::agent("4")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn shutdown_all_unloads_everything() {
    let state = ProbeState::new();
    let registry = registry_with(loader_with_probe(&state), runtime_config());
    registry.load("probe", Scope::System, "probe").await.unwrap();
    registry.load("probe", Scope::agent("1"), "probe").await.unwrap();
    registry.load("time", Scope::agent("1"), "time").await.unwrap();

    registry.shutdown_all().await;

    assert!(registry.is_empty().await);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 2);
}
