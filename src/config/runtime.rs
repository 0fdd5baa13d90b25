//! Invocation runtime and lifecycle configuration.

use crate::error::LambdaError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable that marks the process as running under a test
/// harness. When present, termination-signal handlers are not installed.
pub const TEST_HARNESS_MARKER: &str = "ASYNC_LAMBDA_TEST";

/// Configuration for the per-invocation async runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads for the invocation runtime. `None` uses a
    /// current-thread runtime.
    pub worker_threads: Option<usize>,
    /// Milliseconds to wait for spawned tasks when the runtime is torn down.
    pub shutdown_timeout_ms: u64,
    /// Name given to runtime threads.
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            shutdown_timeout_ms: 1_000,
            thread_name: "async-lambda-worker".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from `ASYNC_LAMBDA_*` environment variables.
    pub fn from_env() -> Result<Self, LambdaError> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("ASYNC_LAMBDA")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize::<RuntimeConfig>()?)
    }

    /// Use a multi-threaded runtime with the given worker count.
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads.max(1));
        self
    }

    /// Set the runtime shutdown timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the runtime thread name.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// The shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Configuration for the process-scoped lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Install SIGINT/SIGTERM handlers on first scope entry.
    pub install_signal_handlers: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            install_signal_handlers: !under_test_harness(),
        }
    }
}

impl LifecycleConfig {
    /// Lifecycle config that never touches process signal handling.
    pub fn for_testing() -> Self {
        Self {
            install_signal_handlers: false,
        }
    }

    /// Enable or disable signal handler installation.
    pub fn install_signal_handlers(mut self, install: bool) -> Self {
        self.install_signal_handlers = install;
        self
    }
}

fn under_test_harness() -> bool {
    std::env::var_os(TEST_HARNESS_MARKER).is_some()
}
