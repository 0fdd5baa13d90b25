//! Capability injectors.
//!
//! Each injector wraps an [`AsyncHandler`](crate::handler::AsyncHandler) and
//! supplies one capability through [`Dependencies`](crate::handler::Dependencies),
//! but only when the wrapped chain declares it in its
//! [`Requirements`](crate::handler::Requirements). Injectors stack in any
//! order: capabilities are acquired outermost first and released innermost
//! first.

mod config;
mod database;

pub use config::{with_config, ConfigInjector, WithConfig};
pub use database::{with_database, DatabaseInjector, WithDatabase};
