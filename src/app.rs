//! Process bootstrap.
//!
//! [`LambdaApp`] owns the process-scoped pieces (lifecycle, settings cache,
//! optional database) and hands out adapters and injectors wired to them.
//! Build one per process, typically in `main` or a `OnceLock`.

use crate::config::{BaseSettings, LifecycleConfig, RuntimeConfig, Settings, SettingsCache};
use crate::database::Database;
use crate::error::LambdaError;
use crate::handler::{AsyncHandler, InvocationAdapter};
use crate::inject::{ConfigInjector, DatabaseInjector, WithConfig, WithDatabase};
use crate::lifecycle::Lifecycle;
use std::sync::Arc;
use tracing::info;

pub struct LambdaApp {
    runtime: RuntimeConfig,
    lifecycle: Arc<Lifecycle>,
    settings: Arc<SettingsCache>,
    database: Option<Arc<Database>>,
}

impl LambdaApp {
    pub fn new(runtime: RuntimeConfig, lifecycle: LifecycleConfig) -> Self {
        Self {
            runtime,
            lifecycle: Lifecycle::new(lifecycle),
            settings: Arc::new(SettingsCache::new()),
            database: None,
        }
    }

    /// Runtime config from `ASYNC_LAMBDA_*` variables, default lifecycle.
    pub fn from_env() -> Result<Self, LambdaError> {
        Ok(Self::new(RuntimeConfig::from_env()?, LifecycleConfig::default()))
    }

    /// An app that never installs signal handlers.
    pub fn for_testing() -> Self {
        Self::new(RuntimeConfig::default(), LifecycleConfig::for_testing())
    }

    /// Attach a database. Its pool is disposed on every scope exit.
    pub fn database(mut self, database: Database) -> Self {
        let database = Arc::new(database);
        database.register_cleanup(&self.lifecycle);
        info!(
            application_name = %database.config().application_name,
            "Registered database cleanup"
        );
        self.database = Some(database);
        self
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    pub fn settings_cache(&self) -> &Arc<SettingsCache> {
        &self.settings
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime
    }

    pub fn database_handle(&self) -> Option<&Arc<Database>> {
        self.database.as_ref()
    }

    /// Wrap `handler` into a synchronous entry point.
    pub fn handler<H: AsyncHandler>(
        &self,
        handler: H,
    ) -> Result<InvocationAdapter<H>, LambdaError> {
        Ok(InvocationAdapter::new(handler, Arc::clone(&self.lifecycle))?
            .with_config(self.runtime.clone()))
    }

    /// Injector for the attached database.
    pub fn database_injector(&self) -> Result<DatabaseInjector, LambdaError> {
        self.database
            .as_ref()
            .map(|database| DatabaseInjector::new(Arc::clone(database)))
            .ok_or_else(|| LambdaError::Configuration("no database attached".to_string()))
    }

    /// Injector for settings schema `S`.
    pub fn config_injector<S: Settings>(&self) -> ConfigInjector<S> {
        ConfigInjector::new(Arc::clone(&self.settings))
    }

    /// Wrap `handler` with sessions from the attached database.
    pub fn with_database<H: AsyncHandler>(
        &self,
        handler: H,
    ) -> Result<WithDatabase<H>, LambdaError> {
        Ok(self.database_injector()?.wrap(handler))
    }

    /// Wrap `handler` with [`BaseSettings`].
    pub fn with_config<H: AsyncHandler>(&self, handler: H) -> WithConfig<H, BaseSettings> {
        self.config_injector::<BaseSettings>().wrap(handler)
    }
}

impl std::fmt::Debug for LambdaApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LambdaApp")
            .field("runtime", &self.runtime)
            .field("lifecycle", &self.lifecycle)
            .field("database", &self.database.is_some())
            .finish()
    }
}
