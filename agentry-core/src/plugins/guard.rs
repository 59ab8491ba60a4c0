//! Execution guard - timeout and failure isolation around one execute call
//!
//! Each call runs on its own task, bounded by a shared pool of permits, and
//! is raced against a deadline. On timeout the task is aborted, which only
//! takes effect at its next await point: work that never yields keeps
//! running (and keeps its permit) until it finishes, but the caller is
//! released on time either way.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use agentry_plugin_api::{
    ExecutionRecord, InstanceKey, MetricsSink, Outcome, Payload, Plugin, PluginRequest,
};
use tokio::sync::Semaphore;
use tokio_util::task::AbortOnDropHandle;
use tracing::Instrument;
use uuid::Uuid;

use super::error::RuntimeError;
use super::metrics::InstanceMetrics;

/// Default wall-clock budget for one execute call
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of execute calls that may run at once across all instances
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 64;

/// What the guard needs to know about the instance being called
pub struct Invocation<'a> {
    pub key: &'a InstanceKey,
    pub plugin: Arc<dyn Plugin>,
    pub metrics: &'a InstanceMetrics,
}

/// Result of a guarded call plus its single execution record
#[derive(Debug)]
pub struct Guarded {
    pub result: Result<Payload, RuntimeError>,
    pub record: ExecutionRecord,
    /// The variant panicked; the caller should treat the instance as unhealthy
    pub panicked: bool,
}

/// Runs execute calls with a deadline, on a bounded set of workers
#[derive(Clone)]
pub struct ExecutionGuard {
    permits: Arc<Semaphore>,
    default_timeout: Duration,
    sink: Arc<dyn MetricsSink>,
}

impl ExecutionGuard {
    pub fn new(
        max_concurrent: usize,
        default_timeout: Duration,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            default_timeout,
            sink,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Execute `request` against the invocation's plugin.
    ///
    /// Exactly one [`ExecutionRecord`] is produced and recorded, whatever the
    /// outcome. Waiting for a free worker counts against the timeout.
    pub async fn execute(
        &self,
        invocation: Invocation<'_>,
        request: PluginRequest,
        timeout: Option<Duration>,
    ) -> Guarded {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let key = invocation.key;
        let span = tracing::debug_span!(
            "plugin_execute",
            plugin = %key.name,
            scope = %key.scope,
            call_id = %Uuid::now_v7(),
        );

        let started = Instant::now();
        let (result, panicked) = self
            .run(key, invocation.plugin, request, timeout)
            .instrument(span)
            .await;
        let duration = started.elapsed();

        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(e) => Outcome::Failure(e.kind()),
        };
        let record = ExecutionRecord { duration, outcome };
        invocation.metrics.record(&record);
        self.sink.record(key, &record);

        Guarded {
            result,
            record,
            panicked,
        }
    }

    async fn run(
        &self,
        key: &InstanceKey,
        plugin: Arc<dyn Plugin>,
        request: PluginRequest,
        timeout: Duration,
    ) -> (Result<Payload, RuntimeError>, bool) {
        let permits = self.permits.clone();
        let call = async move {
            let permit = permits.acquire_owned().await.map_err(|_| RuntimeError::Execution {
                key: key.clone(),
                message: "execution pool is closed".to_string(),
            })?;
            let task = AbortOnDropHandle::new(tokio::spawn(
                async move {
                    let _permit = permit;
                    plugin.execute(request).await
                }
                .in_current_span(),
            ));
            Ok::<_, RuntimeError>(task.await)
        };

        match tokio::time::timeout(timeout, call).await {
            Err(_elapsed) => {
                tracing::warn!(timeout = ?timeout, "Plugin execution timed out");
                (
                    Err(RuntimeError::Timeout {
                        key: key.clone(),
                        timeout,
                    }),
                    false,
                )
            }
            Ok(Err(e)) => (Err(e), false),
            Ok(Ok(Ok(Ok(payload)))) => (Ok(payload), false),
            Ok(Ok(Ok(Err(e)))) => (Err(RuntimeError::from_plugin(key, e)), false),
            Ok(Ok(Err(join_error))) => {
                if join_error.is_panic() {
                    let message = panic_message(join_error.into_panic());
                    tracing::error!(panic = %message, "Plugin panicked during execute");
                    (
                        Err(RuntimeError::Execution {
                            key: key.clone(),
                            message: format!("plugin panicked: {message}"),
                        }),
                        true,
                    )
                } else {
                    (
                        Err(RuntimeError::Execution {
                            key: key.clone(),
                            message: "execution was cancelled".to_string(),
                        }),
                        false,
                    )
                }
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for ExecutionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGuard")
            .field("available_permits", &self.permits.available_permits())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
