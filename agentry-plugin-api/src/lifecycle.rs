//! Health bookkeeping shared by simple variants

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::context::PluginContext;

/// Tracks whether a variant has been initialized and shut down.
///
/// Healthy means initialized and not yet shut down. Shutdown is terminal.
#[derive(Debug, Default)]
pub struct Lifecycle {
    context: OnceLock<Arc<PluginContext>>,
    shut_down: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the context. Returns false if already initialized or shut down.
    pub fn initialize(&self, ctx: Arc<PluginContext>) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            return false;
        }
        self.context.set(ctx).is_ok()
    }

    pub fn context(&self) -> Option<&Arc<PluginContext>> {
        self.context.get()
    }

    pub fn is_healthy(&self) -> bool {
        self.context.get().is_some() && !self.shut_down.load(Ordering::Acquire)
    }

    /// Mark shut down. Returns true only for the first call.
    pub fn shutdown(&self) -> bool {
        !self.shut_down.swap(true, Ordering::AcqRel)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}
