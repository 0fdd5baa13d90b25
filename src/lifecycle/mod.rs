//! Process-scoped cleanup registry and per-invocation lifecycle scopes.
//!
//! [`Lifecycle`] owns the ordered list of cleanup callbacks and the one-time
//! signal installation flag, both behind a single mutex. Each invocation
//! enters one [`LifecycleScope`]; leaving it runs every registered callback
//! in registration order, exactly once per scope.

mod scope;
mod signals;

pub use scope::LifecycleScope;
pub use signals::wait_for_shutdown_signal;

use crate::config::LifecycleConfig;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

type CleanupCallback = Arc<dyn Fn() + Send + Sync + 'static>;

struct LifecycleState {
    signal_handlers_installed: bool,
    callbacks: Vec<CleanupCallback>,
}

/// Outcome of one drain of the cleanup registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Callbacks invoked.
    pub ran: usize,
    /// Callbacks that panicked.
    pub failed: usize,
}

/// Process-scoped lifecycle context.
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
    config: LifecycleConfig,
}

impl Lifecycle {
    /// Create a new lifecycle context.
    pub fn new(config: LifecycleConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LifecycleState {
                signal_handlers_installed: false,
                callbacks: Vec::new(),
            }),
            config,
        })
    }

    /// Create a lifecycle context that never installs signal handlers.
    pub fn for_testing() -> Arc<Self> {
        Self::new(LifecycleConfig::for_testing())
    }

    /// Register a cleanup callback. Safe to call from any thread.
    ///
    /// Callbacks stay registered for the life of the process and run on
    /// every scope exit.
    pub fn register_cleanup<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state.lock().callbacks.push(Arc::new(callback));
    }

    /// Number of registered callbacks.
    pub fn cleanup_count(&self) -> usize {
        self.state.lock().callbacks.len()
    }

    /// Whether signal installation has been attempted (or skipped).
    pub fn signal_handlers_installed(&self) -> bool {
        self.state.lock().signal_handlers_installed
    }

    /// Run every registered callback in registration order.
    ///
    /// The registry is snapshotted under the lock and the lock released
    /// before any callback runs. A panicking callback is logged and the
    /// remaining callbacks still run.
    pub fn run_cleanup(&self) -> CleanupReport {
        let callbacks: Vec<CleanupCallback> = self.state.lock().callbacks.clone();
        let mut report = CleanupReport::default();

        for callback in callbacks {
            report.ran += 1;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
                report.failed += 1;
                error!(
                    error = %panic_message(payload.as_ref()),
                    "Error during cleanup handler execution"
                );
            }
        }

        debug!(ran = report.ran, failed = report.failed, "Cleanup finished");
        report
    }

    /// Clear every callback and the signal flag.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.callbacks.clear();
        state.signal_handlers_installed = false;
    }

    /// Enter a lifecycle scope for one invocation.
    pub fn enter(self: &Arc<Self>) -> LifecycleScope {
        self.ensure_signal_handlers();
        LifecycleScope::new(Arc::clone(self))
    }

    fn ensure_signal_handlers(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.signal_handlers_installed {
            return;
        }
        state.signal_handlers_installed = true;

        if !self.config.install_signal_handlers {
            debug!("Skipping signal handler registration");
            return;
        }

        if let Err(e) = signals::install(Arc::clone(self)) {
            error!(error = %e, "Failed to install termination signal handlers");
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Lifecycle")
            .field("signal_handlers_installed", &state.signal_handlers_installed)
            .field("callbacks", &state.callbacks.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Drive async cleanup work from a synchronous cleanup callback.
///
/// Outside a runtime a throwaway current-thread runtime runs `future` to
/// completion. Inside a running runtime that is not possible, so the work is
/// spawned on it with a warning and may not finish before the process exits.
pub fn run_async_cleanup<F>(label: &'static str, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            warn!(
                task = label,
                "Runtime active during cleanup - scheduling async cleanup, it may not complete"
            );
            handle.spawn(future);
        }
        Err(_) => match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(future),
            Err(e) => error!(task = label, error = %e, "Failed to build cleanup runtime"),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "cleanup callback panicked".to_string()
    }
}
