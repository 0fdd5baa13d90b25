//! Dispatch to one of several handlers by function id.

use crate::error::LambdaError;
use crate::handler::context::LambdaContext;
use crate::handler::handler::LambdaHandler;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Environment variable holding the id of the function to run.
pub const FUNCTION_ID_ENV: &str = "LAMBDA_FUNCTION_ID";

/// Registry of synchronous handlers keyed by function id.
///
/// A single deployment package can bundle several functions; the router
/// picks one per invocation from [`FUNCTION_ID_ENV`].
pub struct Router {
    handlers: RwLock<HashMap<String, Arc<dyn LambdaHandler>>>,
    env_var: String,
}

impl Router {
    pub fn new() -> Self {
        Self::with_env_var(FUNCTION_ID_ENV)
    }

    /// Read the function id from a different variable.
    pub fn with_env_var(env_var: impl Into<String>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            env_var: env_var.into(),
        }
    }

    /// Register a handler under `id`.
    pub fn register<H>(&self, id: impl Into<String>, handler: H) -> Result<(), LambdaError>
    where
        H: LambdaHandler + 'static,
    {
        let id = id.into();
        let mut handlers = self.handlers.write();

        if handlers.contains_key(&id) {
            return Err(LambdaError::DuplicateFunction(id));
        }

        handlers.insert(id.clone(), Arc::new(handler));
        info!("Registered function: {}", id);
        Ok(())
    }

    /// Invoke the handler registered under `id`.
    pub fn dispatch(
        &self,
        id: &str,
        event: Value,
        context: LambdaContext,
    ) -> Result<Value, anyhow::Error> {
        let handler = self
            .handlers
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| LambdaError::FunctionNotFound(id.to_string()))?;

        debug!(function_id = %id, request_id = %context.request_id, "Dispatching");
        handler.invoke(event, context)
    }

    /// Resolve the function id and dispatch.
    ///
    /// The id comes from the invocation context's environment first, then
    /// from the process environment.
    pub fn route(&self, event: Value, context: LambdaContext) -> Result<Value, anyhow::Error> {
        let id = self.resolve_id(&context)?;
        self.dispatch(&id, event, context)
    }

    fn resolve_id(&self, context: &LambdaContext) -> Result<String, LambdaError> {
        if let Some(id) = context.get_env(&self.env_var).filter(|id| !id.is_empty()) {
            return Ok(id.clone());
        }
        match std::env::var(&self.env_var) {
            Ok(id) if !id.is_empty() => Ok(id),
            _ => {
                warn!(env_var = %self.env_var, "No function id configured");
                Err(LambdaError::MissingFunctionId(self.env_var.clone()))
            }
        }
    }

    /// Registered function ids, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handlers.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.read().contains_key(id)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl LambdaHandler for Router {
    fn invoke(&self, event: Value, context: LambdaContext) -> Result<Value, anyhow::Error> {
        self.route(event, context)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("functions", &self.list())
            .field("env_var", &self.env_var)
            .finish()
    }
}
