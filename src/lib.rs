//! # async-lambda - async handlers for synchronous serverless runtimes
//!
//! Serverless hosts call a synchronous `(event, context) -> response`
//! function. This crate lets that function be an `async fn` and adds the
//! plumbing most handlers end up needing: scoped cleanup, an optional pooled
//! database session, cached settings and structured fault classification.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 Host runtime: invoke(event, context)                │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  InvocationAdapter  (fresh tokio runtime + one LifecycleScope)      │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │  WithDatabase    acquire session ──────────── close/rollback │   │
//! │  │  ┌───────────────────────────────────────────────────────┐  │   │
//! │  │  │  WithConfig    cached settings snapshot               │  │   │
//! │  │  │  ┌─────────────────────────────────────────────────┐  │  │   │
//! │  │  │  │  #[lambda_handler] async fn                      │  │  │   │
//! │  │  │  └─────────────────────────────────────────────────┘  │  │   │
//! │  │  └───────────────────────────────────────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                   │ scope exit
//!                                   ▼
//!                 Lifecycle cleanup callbacks, in order
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use async_lambda::prelude::*;
//!
//! #[lambda_handler(name = "hello")]
//! async fn hello(event: Value, context: LambdaContext) -> anyhow::Result<Value> {
//!     Ok(serde_json::json!({
//!         "statusCode": 200,
//!         "body": format!("Hello from {}", context.function_name),
//!         "echo": event,
//!     }))
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let app = LambdaApp::from_env()?;
//!     let handler = app.handler(HelloHandler::new())?;
//!
//!     let response = handler.invoke(serde_json::json!({}), LambdaContext::from_env("local"))?;
//!     println!("{response}");
//!     Ok(())
//! }
//! ```
//!
//! ## Capabilities
//!
//! A handler opts into injection by declaring the reserved parameters
//! `db_session` and/or `settings`. The matching injector must wrap it, or
//! building the adapter fails with [`LambdaError::UnsatisfiedCapability`]:
//!
//! ```rust,ignore
//! #[lambda_handler]
//! async fn orders(
//!     event: Value,
//!     context: LambdaContext,
//!     db_session: DbSession,
//!     settings: Arc<BaseSettings>,
//! ) -> anyhow::Result<Value> { /* ... */ }
//!
//! let handler = app.handler(app.with_database(app.with_config(OrdersHandler::new()))?)?;
//! ```
//!
//! Handler shape is checked at compile time. A plain `fn` is rejected:
//!
//! ```compile_fail
//! use async_lambda::prelude::*;
//!
//! #[lambda_handler]
//! fn not_async(event: Value, _context: LambdaContext) -> anyhow::Result<Value> {
//!     Ok(event)
//! }
//! ```
//!
//! So is any extra parameter other than `db_session` or `settings`:
//!
//! ```compile_fail
//! use async_lambda::prelude::*;
//!
//! #[lambda_handler]
//! async fn orders(event: Value, _context: LambdaContext, db: DbSession) -> anyhow::Result<Value> {
//!     Ok(event)
//! }
//! ```
//!
//! And a closure that does not return a future cannot become a handler:
//!
//! ```compile_fail
//! use async_lambda::prelude::*;
//!
//! let handler = handler_fn(|event: Value, _context: LambdaContext, _deps: Dependencies| {
//!     Ok::<_, anyhow::Error>(event)
//! });
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Enter**: the first scope installs SIGINT/SIGTERM handling once.
//! 2. **Run**: the handler chain runs on a runtime built for this call.
//! 3. **Exit**: the runtime shuts down, then every cleanup callback runs.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod errors;
pub mod handler;
pub mod inject;
pub mod lifecycle;
pub mod logging;
pub mod secrets;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::app::LambdaApp;
    pub use crate::config::{BaseSettings, LifecycleConfig, RuntimeConfig, Settings};
    pub use crate::database::{Database, DatabaseConfig, DbSession};
    pub use crate::error::{Fault, FaultKind, LambdaError};
    pub use crate::errors::{ErrorHandler, ProcessingError, ProcessingResult};
    pub use crate::handler::{
        handler_fn, AsyncHandler, Dependencies, InvocationAdapter, LambdaContext, LambdaHandler,
        Requirements, Router,
    };
    pub use crate::inject::{ConfigInjector, DatabaseInjector};
    pub use crate::lifecycle::Lifecycle;
    pub use async_lambda_macro::lambda_handler;
    pub use async_trait::async_trait;
    pub use serde_json::Value;
    pub use std::sync::Arc;
}

// Re-export for convenience and for `#[lambda_handler]` expansions.
pub use anyhow;
pub use app::LambdaApp;
pub use async_lambda_macro::lambda_handler;
pub use async_trait::async_trait;
pub use error::{Fault, FaultKind, LambdaError};
pub use handler::{
    handler_fn, AsyncHandler, Dependencies, InvocationAdapter, LambdaContext, LambdaHandler,
    Requirements,
};
pub use lifecycle::{Lifecycle, LifecycleScope};
pub use serde_json::Value;
