//! Per-invocation lifecycle scope.

use super::{CleanupReport, Lifecycle};
use std::sync::Arc;

/// Guard for one invocation's lifecycle scope.
///
/// Cleanup runs exactly once: on [`LifecycleScope::close`], or on drop if
/// the scope is left by unwinding.
#[must_use = "dropping the scope immediately runs cleanup"]
pub struct LifecycleScope {
    lifecycle: Arc<Lifecycle>,
    closed: bool,
}

impl LifecycleScope {
    pub(super) fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            lifecycle,
            closed: false,
        }
    }

    /// Leave the scope, running every registered cleanup callback.
    pub fn close(mut self) -> CleanupReport {
        self.closed = true;
        self.lifecycle.run_cleanup()
    }
}

impl Drop for LifecycleScope {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.lifecycle.run_cleanup();
        }
    }
}

impl std::fmt::Debug for LifecycleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleScope")
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_lifecycle() -> (Arc<Lifecycle>, Arc<AtomicUsize>) {
        let lifecycle = Lifecycle::for_testing();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        lifecycle.register_cleanup(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (lifecycle, calls)
    }

    #[test]
    fn test_close_runs_cleanup_once() {
        let (lifecycle, calls) = counting_lifecycle();
        let scope = lifecycle.enter();
        let report = scope.close();
        assert_eq!(report.ran, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_runs_cleanup_once() {
        let (lifecycle, calls) = counting_lifecycle();
        {
            let _scope = lifecycle.enter();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unwinding_body_still_runs_cleanup() {
        let (lifecycle, calls) = counting_lifecycle();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = lifecycle.enter();
            panic!("handler body failed");
        }));
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
