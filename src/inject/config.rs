use crate::config::{BaseSettings, Settings, SettingsCache};
use crate::handler::{AsyncHandler, Dependencies, LambdaContext, Requirements};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Supplies a cached `settings` snapshot of schema `S` to handlers that
/// declare one.
pub struct ConfigInjector<S = BaseSettings> {
    cache: Arc<SettingsCache>,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Settings> ConfigInjector<S> {
    pub fn new(cache: Arc<SettingsCache>) -> Self {
        Self {
            cache,
            _schema: PhantomData,
        }
    }

    pub fn wrap<H: AsyncHandler>(&self, handler: H) -> WithConfig<H, S> {
        WithConfig {
            inner: handler,
            cache: Arc::clone(&self.cache),
            _schema: PhantomData,
        }
    }
}

impl<S> Clone for ConfigInjector<S> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            _schema: PhantomData,
        }
    }
}

impl<S> std::fmt::Debug for ConfigInjector<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigInjector")
            .field("schema", &std::any::type_name::<S>())
            .finish()
    }
}

/// Wrap `handler` with [`BaseSettings`] from `cache`.
pub fn with_config<H: AsyncHandler>(
    handler: H,
    cache: Arc<SettingsCache>,
) -> WithConfig<H, BaseSettings> {
    ConfigInjector::<BaseSettings>::new(cache).wrap(handler)
}

/// A handler wrapped by a [`ConfigInjector`].
pub struct WithConfig<H, S = BaseSettings> {
    inner: H,
    cache: Arc<SettingsCache>,
    _schema: PhantomData<fn() -> S>,
}

impl<H, S> WithConfig<H, S> {
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: AsyncHandler, S: Settings> AsyncHandler for WithConfig<H, S> {
    async fn call(
        &self,
        event: Value,
        context: LambdaContext,
        deps: Dependencies,
    ) -> Result<Value, anyhow::Error> {
        let deps = if self.inner.requirements().needs_settings() {
            deps.with_settings(self.cache.get::<S>()?)
        } else {
            deps
        };
        self.inner.call(event, context, deps).await
    }

    fn requirements(&self) -> Requirements {
        self.inner.requirements().with_settings(false)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
