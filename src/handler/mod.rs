//! Handler traits, invocation context and the synchronous invocation adapter.

pub mod adapter;
pub mod context;
pub mod handler;
pub mod router;

pub use adapter::InvocationAdapter;
pub use context::LambdaContext;
pub use handler::{handler_fn, AsyncHandler, Dependencies, HandlerFn, LambdaHandler, Requirements};
pub use router::Router;
