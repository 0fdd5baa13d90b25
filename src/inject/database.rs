use crate::database::{Database, DbSession, SessionFactory};
use crate::error::LambdaError;
use crate::handler::{AsyncHandler, Dependencies, LambdaContext, Requirements};
use crate::lifecycle::Lifecycle;
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Clone)]
enum SessionSource {
    Pool(Arc<Database>),
    Factory(Arc<dyn SessionFactory>),
}

/// Supplies a `db_session` to handlers that declare one.
///
/// By default sessions come from the shared [`Database`] pool, which is
/// initialized on first use. A [`SessionFactory`] replaces the pool entirely.
#[derive(Clone)]
pub struct DatabaseInjector {
    source: SessionSource,
}

impl DatabaseInjector {
    /// Sessions from the shared pool.
    ///
    /// The pool is not disposed by this injector. Call
    /// [`Database::register_cleanup`] once (as [`LambdaApp::database`] does),
    /// or use [`DatabaseInjector::with_lifecycle`], so the pool is closed
    /// before the invocation runtime that created it goes away.
    ///
    /// [`LambdaApp::database`]: crate::app::LambdaApp::database
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            source: SessionSource::Pool(database),
        }
    }

    /// Sessions from the shared pool, disposed on every exit of a
    /// `lifecycle` scope.
    pub fn with_lifecycle(database: Arc<Database>, lifecycle: &Lifecycle) -> Self {
        database.register_cleanup(lifecycle);
        Self::new(database)
    }

    /// Sessions from a caller-supplied factory.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: SessionFactory + 'static,
    {
        Self {
            source: SessionSource::Factory(Arc::new(factory)),
        }
    }

    pub fn wrap<H: AsyncHandler>(&self, handler: H) -> WithDatabase<H> {
        WithDatabase {
            inner: handler,
            source: self.source.clone(),
        }
    }
}

impl std::fmt::Debug for DatabaseInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.source {
            SessionSource::Pool(_) => "pool",
            SessionSource::Factory(_) => "factory",
        };
        f.debug_struct("DatabaseInjector")
            .field("source", &source)
            .finish()
    }
}

/// Wrap `handler` with sessions from `database`.
///
/// Pool disposal is the caller's job; see [`DatabaseInjector::new`].
pub fn with_database<H: AsyncHandler>(handler: H, database: Arc<Database>) -> WithDatabase<H> {
    DatabaseInjector::new(database).wrap(handler)
}

/// A handler wrapped by a [`DatabaseInjector`].
pub struct WithDatabase<H> {
    inner: H,
    source: SessionSource,
}

impl<H: AsyncHandler> WithDatabase<H> {
    pub fn inner(&self) -> &H {
        &self.inner
    }

    async fn call_pooled(
        &self,
        database: &Database,
        event: Value,
        context: LambdaContext,
        deps: Dependencies,
    ) -> Result<Value, anyhow::Error> {
        let session = database.acquire_session().await?;
        let call = self
            .inner
            .call(event, context, deps.with_db_session(session.clone()));
        run_with_session(&session, true, call).await
    }

    async fn call_factory(
        &self,
        factory: &dyn SessionFactory,
        event: Value,
        context: LambdaContext,
        deps: Dependencies,
    ) -> Result<Value, anyhow::Error> {
        let session = DbSession::new(factory.create().await?);
        let call = self
            .inner
            .call(event, context, deps.with_db_session(session.clone()));
        run_with_session(&session, false, call).await
    }
}

/// Drive `call`, then release `session` whether it returned or panicked.
///
/// A panic is re-raised once the session is released.
async fn run_with_session<F>(
    session: &DbSession,
    rollback_on_fault: bool,
    call: F,
) -> Result<Value, anyhow::Error>
where
    F: Future<Output = Result<Value, anyhow::Error>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => {
            if rollback_on_fault && result.is_err() {
                rollback(session).await;
            }
            release(session, result).await
        }
        Err(payload) => {
            error!("Handler panicked while holding a database session");
            if rollback_on_fault {
                rollback(session).await;
            }
            if let Err(e) = session.close().await {
                warn!(error = %e, "Failed to close database session after handler panic");
            }
            panic::resume_unwind(payload)
        }
    }
}

async fn rollback(session: &DbSession) {
    if let Err(e) = session.rollback().await {
        error!(error = %e, "Failed to roll back database session");
    }
}

/// Close `session`; the handler's own fault wins over a close fault.
async fn release(
    session: &DbSession,
    result: Result<Value, anyhow::Error>,
) -> Result<Value, anyhow::Error> {
    match (session.close().await, result) {
        (Ok(()), result) => {
            debug!("Database session closed");
            result
        }
        (Err(e), Err(handler_error)) => {
            warn!(error = %e, "Failed to close database session after handler error");
            Err(handler_error)
        }
        (Err(e), Ok(_)) => Err(e.into()),
    }
}

#[async_trait]
impl<H: AsyncHandler> AsyncHandler for WithDatabase<H> {
    async fn call(
        &self,
        event: Value,
        context: LambdaContext,
        deps: Dependencies,
    ) -> Result<Value, anyhow::Error> {
        if !self.inner.requirements().needs_db_session() {
            return self.inner.call(event, context, deps).await;
        }

        match &self.source {
            SessionSource::Pool(database) => {
                self.call_pooled(database, event, context, deps).await
            }
            SessionSource::Factory(factory) => {
                self.call_factory(factory.as_ref(), event, context, deps)
                    .await
            }
        }
    }

    fn requirements(&self) -> Requirements {
        self.inner.requirements().with_db_session(false)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
