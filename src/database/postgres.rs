//! Postgres pool backed by `sqlx`.
//!
//! Each session is a transaction on a pooled connection. Closing commits any
//! open transaction; rolling back discards it.

use super::{DatabaseConfig, PoolConnector, Session, SessionPool};
use crate::error::LambdaError;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, error};

/// Connects a [`PgSessionPool`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

#[async_trait]
impl PoolConnector for PgConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Arc<dyn SessionPool>, LambdaError> {
        let url = config.resolve_url()?;
        let options: PgConnectOptions = url.parse()?;
        let mut options = options
            .application_name(&config.application_name)
            .options([
                ("timezone", "UTC".to_string()),
                ("statement_timeout", format!("{}s", config.command_timeout)),
            ]);
        if !config.echo {
            options = sqlx::ConnectOptions::disable_statement_logging(options);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections())
            .min_connections(0)
            .max_lifetime(config.recycle_after())
            .acquire_timeout(config.connect_timeout_duration())
            .test_before_acquire(config.pre_ping)
            .connect_with(options)
            .await?;

        Ok(Arc::new(PgSessionPool { pool }))
    }
}

/// A `sqlx` Postgres pool.
#[derive(Debug, Clone)]
pub struct PgSessionPool {
    pool: PgPool,
}

impl PgSessionPool {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionPool for PgSessionPool {
    async fn acquire(&self) -> Result<Box<dyn Session>, LambdaError> {
        let transaction = self.pool.begin().await?;
        Ok(Box::new(PgSession {
            transaction: Some(transaction),
        }))
    }

    async fn health_check(&self) -> bool {
        match sqlx::query_scalar::<_, String>("SHOW timezone")
            .fetch_one(&self.pool)
            .await
        {
            Ok(timezone) => {
                debug!(timezone = %timezone, "Database timezone setting");
                true
            }
            Err(e) => {
                error!(error = %e, "Database health check failed");
                false
            }
        }
    }

    async fn dispose(&self) {
        self.pool.close().await;
    }
}

/// A transaction on a pooled Postgres connection.
pub struct PgSession {
    transaction: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    /// The open transaction, or an error once the session was released.
    pub fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>, LambdaError> {
        self.transaction
            .as_mut()
            .ok_or_else(|| LambdaError::Database("session already closed".to_string()))
    }
}

#[async_trait]
impl Session for PgSession {
    async fn rollback(&mut self) -> Result<(), LambdaError> {
        if let Some(transaction) = self.transaction.take() {
            transaction.rollback().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LambdaError> {
        if let Some(transaction) = self.transaction.take() {
            transaction.commit().await?;
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
