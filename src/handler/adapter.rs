//! Synchronous invocation adapter.
//!
//! Every call builds a fresh async runtime, runs the handler chain on it
//! inside one lifecycle scope, tears the runtime down and only then leaves
//! the scope. Runtimes are never reused, so nothing spawned during one
//! invocation survives into the next.

use crate::config::RuntimeConfig;
use crate::error::LambdaError;
use crate::handler::context::LambdaContext;
use crate::handler::handler::{AsyncHandler, Dependencies, LambdaHandler};
use crate::lifecycle::Lifecycle;
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error};

/// Wraps an [`AsyncHandler`] into a synchronous [`LambdaHandler`].
pub struct InvocationAdapter<H> {
    handler: H,
    lifecycle: Arc<Lifecycle>,
    config: RuntimeConfig,
}

impl<H: AsyncHandler> InvocationAdapter<H> {
    /// Wrap `handler`.
    ///
    /// Fails if the chain still declares a capability that no injector
    /// supplies.
    pub fn new(handler: H, lifecycle: Arc<Lifecycle>) -> Result<Self, LambdaError> {
        if let Some(capability) = handler.requirements().first_missing() {
            return Err(LambdaError::UnsatisfiedCapability {
                handler: handler.name().to_string(),
                capability,
            });
        }

        Ok(Self {
            handler,
            lifecycle,
            config: RuntimeConfig::default(),
        })
    }

    /// Use a specific runtime configuration.
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    fn build_runtime(&self) -> Result<Runtime, LambdaError> {
        let mut builder = match self.config.worker_threads {
            Some(threads) => {
                let mut builder = Builder::new_multi_thread();
                builder.worker_threads(threads);
                builder
            }
            None => Builder::new_current_thread(),
        };

        builder
            .enable_all()
            .thread_name(self.config.thread_name.clone())
            .build()
            .map_err(LambdaError::Runtime)
    }

    fn run(&self, event: Value, context: LambdaContext) -> Result<Value, anyhow::Error> {
        let runtime = self.build_runtime()?;
        let outcome = runtime.block_on(self.handler.call(event, context, Dependencies::new()));
        runtime.shutdown_timeout(self.config.shutdown_timeout_duration());
        outcome
    }
}

impl<H: AsyncHandler> LambdaHandler for InvocationAdapter<H> {
    fn invoke(&self, event: Value, context: LambdaContext) -> Result<Value, anyhow::Error> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(LambdaError::NestedRuntime.into());
        }

        let request_id = context.request_id.clone();
        debug!(handler = self.handler.name(), request_id = %request_id, "Invoking handler");

        let scope = self.lifecycle.enter();
        let result = self.run(event, context);
        let report = scope.close();

        if report.failed > 0 {
            debug!(failed = report.failed, "Cleanup reported failures");
        }
        if let Err(ref e) = result {
            error!(
                handler = self.handler.name(),
                request_id = %request_id,
                error = %e,
                "Lambda handler failed"
            );
        }
        result
    }
}

impl<H: AsyncHandler> std::fmt::Debug for InvocationAdapter<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationAdapter")
            .field("handler", &self.handler.name())
            .field("config", &self.config)
            .finish()
    }
}
