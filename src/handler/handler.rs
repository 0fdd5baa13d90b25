//! Handler traits and the capability bag passed along the wrapper chain.

use crate::database::DbSession;
use crate::error::LambdaError;
use crate::handler::context::LambdaContext;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

/// Capabilities a handler wants injected.
///
/// `#[lambda_handler]` derives this from the reserved parameter names
/// `db_session` and `settings`; [`HandlerFn::requires`] sets it explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    db_session: bool,
    settings: bool,
}

impl Requirements {
    pub const fn new() -> Self {
        Self {
            db_session: false,
            settings: false,
        }
    }

    pub const fn with_db_session(mut self, wanted: bool) -> Self {
        self.db_session = wanted;
        self
    }

    pub const fn with_settings(mut self, wanted: bool) -> Self {
        self.settings = wanted;
        self
    }

    pub const fn needs_db_session(&self) -> bool {
        self.db_session
    }

    pub const fn needs_settings(&self) -> bool {
        self.settings
    }

    pub const fn is_empty(&self) -> bool {
        !self.db_session && !self.settings
    }

    /// The first capability still wanted, by its parameter name.
    pub const fn first_missing(&self) -> Option<&'static str> {
        if self.db_session {
            Some("db_session")
        } else if self.settings {
            Some("settings")
        } else {
            None
        }
    }
}

/// Capabilities supplied by the injectors for one invocation.
#[derive(Clone, Default)]
pub struct Dependencies {
    db_session: Option<DbSession>,
    settings: Option<Arc<dyn Any + Send + Sync>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_db_session(mut self, session: DbSession) -> Self {
        self.db_session = Some(session);
        self
    }

    pub fn with_settings<S: Any + Send + Sync>(mut self, settings: Arc<S>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// The injected session.
    pub fn db_session(&self) -> Result<DbSession, LambdaError> {
        self.db_session
            .clone()
            .ok_or(LambdaError::MissingCapability("db_session"))
    }

    /// The injected settings snapshot as `S`.
    pub fn settings<S: Any + Send + Sync>(&self) -> Result<Arc<S>, LambdaError> {
        let settings = self
            .settings
            .clone()
            .ok_or(LambdaError::MissingCapability("settings"))?;
        settings
            .downcast::<S>()
            .map_err(|_| LambdaError::SettingsType {
                expected: std::any::type_name::<S>(),
            })
    }

    pub fn has_db_session(&self) -> bool {
        self.db_session.is_some()
    }

    pub fn has_settings(&self) -> bool {
        self.settings.is_some()
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependencies")
            .field("db_session", &self.db_session.is_some())
            .field("settings", &self.settings.is_some())
            .finish()
    }
}

/// An asynchronous handler.
///
/// Injectors implement this trait too, so a chain of wrappers is itself an
/// `AsyncHandler`.
#[async_trait]
pub trait AsyncHandler: Send + Sync {
    /// Handle one event.
    async fn call(
        &self,
        event: Value,
        context: LambdaContext,
        deps: Dependencies,
    ) -> Result<Value, anyhow::Error>;

    /// Capabilities this handler (or the chain beneath it) still needs.
    fn requirements(&self) -> Requirements {
        Requirements::default()
    }

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<H: AsyncHandler + ?Sized> AsyncHandler for Arc<H> {
    async fn call(
        &self,
        event: Value,
        context: LambdaContext,
        deps: Dependencies,
    ) -> Result<Value, anyhow::Error> {
        (**self).call(event, context, deps).await
    }

    fn requirements(&self) -> Requirements {
        (**self).requirements()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<H: AsyncHandler + ?Sized> AsyncHandler for Box<H> {
    async fn call(
        &self,
        event: Value,
        context: LambdaContext,
        deps: Dependencies,
    ) -> Result<Value, anyhow::Error> {
        (**self).call(event, context, deps).await
    }

    fn requirements(&self) -> Requirements {
        (**self).requirements()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// The synchronous call signature the host runtime expects.
pub trait LambdaHandler: Send + Sync {
    fn invoke(&self, event: Value, context: LambdaContext) -> Result<Value, anyhow::Error>;
}

impl<F> LambdaHandler for F
where
    F: Fn(Value, LambdaContext) -> Result<Value, anyhow::Error> + Send + Sync,
{
    fn invoke(&self, event: Value, context: LambdaContext) -> Result<Value, anyhow::Error> {
        (self)(event, context)
    }
}

/// An [`AsyncHandler`] built from a closure.
pub struct HandlerFn<F> {
    f: F,
    name: String,
    requirements: Requirements,
}

/// Build an [`AsyncHandler`] from an async closure.
///
/// ```rust
/// use async_lambda::prelude::*;
///
/// let handler = handler_fn(|_event, _context, _deps| async move {
///     Ok::<_, anyhow::Error>(serde_json::json!({ "statusCode": 200 }))
/// });
/// assert!(handler.requirements().is_empty());
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Value, LambdaContext, Dependencies) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, anyhow::Error>> + Send + 'static,
{
    HandlerFn {
        f,
        name: "handler_fn".to_string(),
        requirements: Requirements::default(),
    }
}

impl<F> HandlerFn<F> {
    /// Declare the capabilities this closure expects in its `Dependencies`.
    pub fn requires(mut self, requirements: Requirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Set the name used in logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<F, Fut> AsyncHandler for HandlerFn<F>
where
    F: Fn(Value, LambdaContext, Dependencies) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, anyhow::Error>> + Send + 'static,
{
    async fn call(
        &self,
        event: Value,
        context: LambdaContext,
        deps: Dependencies,
    ) -> Result<Value, anyhow::Error> {
        (self.f)(event, context, deps).await
    }

    fn requirements(&self) -> Requirements {
        self.requirements
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Region(&'static str);

    #[test]
    fn test_requirements_builder() {
        let req = Requirements::new().with_db_session(true);
        assert!(req.needs_db_session());
        assert!(!req.needs_settings());
        assert_eq!(req.first_missing(), Some("db_session"));
        assert_eq!(Requirements::new().first_missing(), None);
    }

    #[test]
    fn test_dependencies_settings_downcast() {
        let deps = Dependencies::new().with_settings(Arc::new(Region("eu-west-1")));
        assert_eq!(*deps.settings::<Region>().unwrap(), Region("eu-west-1"));

        let err = deps.settings::<String>().unwrap_err();
        assert!(matches!(err, LambdaError::SettingsType { .. }));
    }

    #[test]
    fn test_missing_capabilities() {
        let deps = Dependencies::new();
        assert!(matches!(
            deps.db_session().unwrap_err(),
            LambdaError::MissingCapability("db_session")
        ));
        assert!(matches!(
            deps.settings::<Region>().unwrap_err(),
            LambdaError::MissingCapability("settings")
        ));
    }

    #[tokio::test]
    async fn test_handler_fn_calls_closure() {
        let handler = handler_fn(|event: Value, context: LambdaContext, _deps| async move {
            Ok::<_, anyhow::Error>(json!({ "echo": event, "request_id": context.request_id }))
        })
        .named("echo");

        let response = handler
            .call(json!("hi"), LambdaContext::new("echo", "req-1"), Dependencies::new())
            .await
            .unwrap();
        assert_eq!(response, json!({ "echo": "hi", "request_id": "req-1" }));
        assert_eq!(handler.name(), "echo");
    }

    #[test]
    fn test_closure_is_a_lambda_handler() {
        let handler = |event: Value, _context: LambdaContext| -> Result<Value, anyhow::Error> {
            Ok(event)
        };
        let response = handler.invoke(json!(1), LambdaContext::default()).unwrap();
        assert_eq!(response, json!(1));
    }
}
