//! Pooled data-store sessions.
//!
//! The pool itself is an external collaborator behind [`SessionPool`]; this
//! module owns when it is created and disposed. [`Database::init`] is
//! idempotent, [`Database::acquire_session`] initializes on demand, and
//! [`Database::register_cleanup`] hooks disposal into the lifecycle so the
//! pool never outlives the invocation runtime it was created on.

mod config;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use config::{DatabaseConfig, DATABASE_URL_ENV};

use crate::error::LambdaError;
use crate::lifecycle::{run_async_cleanup, Lifecycle};
use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

/// A unit of work bound to one pooled connection.
#[async_trait]
pub trait Session: Send + 'static {
    /// Discard uncommitted work.
    async fn rollback(&mut self) -> Result<(), LambdaError>;

    /// Release the connection back to the pool.
    async fn close(&mut self) -> Result<(), LambdaError>;

    /// Access the concrete session type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Session {
    /// Downcast to the concrete session type.
    pub fn downcast_mut<T: Session>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// A process-wide connection pool.
#[async_trait]
pub trait SessionPool: Send + Sync {
    /// Open a session on a pooled connection.
    async fn acquire(&self) -> Result<Box<dyn Session>, LambdaError>;

    /// Whether the pool can reach the server.
    async fn health_check(&self) -> bool;

    /// Close every connection.
    async fn dispose(&self);
}

/// Builds a [`SessionPool`] from configuration.
#[async_trait]
pub trait PoolConnector: Send + Sync {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Arc<dyn SessionPool>, LambdaError>;
}

/// Caller-supplied session source that replaces the pool.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn Session>, LambdaError>;
}

#[async_trait]
impl<F, Fut> SessionFactory for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Box<dyn Session>, LambdaError>> + Send + 'static,
{
    async fn create(&self) -> Result<Box<dyn Session>, LambdaError> {
        (self)().await
    }
}

/// Shared handle to the session injected into a handler.
///
/// Clones refer to the same session; the injector keeps one to release it.
#[derive(Clone)]
pub struct DbSession {
    inner: Arc<Mutex<Box<dyn Session>>>,
}

impl DbSession {
    pub fn new(session: Box<dyn Session>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Lock the session for use.
    pub async fn lock(&self) -> MutexGuard<'_, Box<dyn Session>> {
        self.inner.lock().await
    }

    /// Run `f` against the concrete session type.
    pub async fn with<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, LambdaError>
    where
        T: Session,
    {
        let mut guard = self.inner.lock().await;
        let session = guard.downcast_mut::<T>().ok_or_else(|| {
            LambdaError::Database(format!(
                "session is not a {}",
                std::any::type_name::<T>()
            ))
        })?;
        Ok(f(session))
    }

    pub async fn rollback(&self) -> Result<(), LambdaError> {
        self.inner.lock().await.rollback().await
    }

    pub async fn close(&self) -> Result<(), LambdaError> {
        self.inner.lock().await.close().await
    }
}

impl std::fmt::Debug for DbSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbSession").finish_non_exhaustive()
    }
}

/// On-demand pool manager.
pub struct Database {
    config: DatabaseConfig,
    connector: Arc<dyn PoolConnector>,
    pool: Mutex<Option<Arc<dyn SessionPool>>>,
}

impl Database {
    pub fn new(config: DatabaseConfig, connector: Arc<dyn PoolConnector>) -> Self {
        Self {
            config,
            connector,
            pool: Mutex::new(None),
        }
    }

    /// Postgres-backed database.
    #[cfg(feature = "postgres")]
    pub fn postgres(config: DatabaseConfig) -> Self {
        Self::new(config, Arc::new(postgres::PgConnector))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Create the pool. A second call while initialized is a no-op.
    pub async fn init(&self) -> Result<(), LambdaError> {
        let mut pool = self.pool.lock().await;
        if pool.is_some() {
            debug!("Database already initialized");
            return Ok(());
        }

        let created = self.connector.connect(&self.config).await.map_err(|e| {
            error!(error = %e, "Failed to initialize database connections");
            e
        })?;
        *pool = Some(created);

        info!(
            application_name = %self.config.application_name,
            max_connections = self.config.max_connections(),
            "Database connections initialized successfully"
        );
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.pool.lock().await.is_some()
    }

    /// Open a session, initializing the pool first if needed.
    pub async fn acquire_session(&self) -> Result<DbSession, LambdaError> {
        self.init().await?;
        let pool = self
            .pool
            .lock()
            .await
            .clone()
            .ok_or_else(|| LambdaError::Database("session pool not initialized".to_string()))?;

        let session = pool.acquire().await?;
        Ok(DbSession::new(session))
    }

    /// False when the pool is not initialized or unreachable.
    pub async fn health_check(&self) -> bool {
        let pool = self.pool.lock().await.clone();
        match pool {
            Some(pool) => pool.health_check().await,
            None => false,
        }
    }

    /// Close the pool and return to the uninitialized state.
    pub async fn dispose(&self) {
        let pool = self.pool.lock().await.take();
        if let Some(pool) = pool {
            pool.dispose().await;
            info!("Database engine disposed");
        }
    }

    /// Register pool disposal as a lifecycle cleanup callback.
    pub fn register_cleanup(self: &Arc<Self>, lifecycle: &Lifecycle) {
        let database = Arc::clone(self);
        lifecycle.register_cleanup(move || {
            let database = Arc::clone(&database);
            run_async_cleanup("database", async move { database.dispose().await });
        });
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
