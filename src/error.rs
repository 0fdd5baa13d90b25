//! Error types for the handler runtime.
//!
//! Library faults are [`LambdaError`]. Handler faults travel as
//! [`anyhow::Error`] and are never rewrapped; [`Fault`] lets a handler tag an
//! error with an explicit [`FaultKind`] for the classifier.

use thiserror::Error;

/// Errors raised by the runtime itself.
#[derive(Debug, Error)]
pub enum LambdaError {
    #[error("Failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Handler invoked from inside a running async runtime; the invocation adapter owns its runtime")]
    NestedRuntime,

    #[error("Handler '{handler}' declares '{capability}' but no injector supplies it")]
    UnsatisfiedCapability {
        handler: String,
        capability: &'static str,
    },

    #[error("Capability '{0}' was not injected for this invocation")]
    MissingCapability(&'static str),

    #[error("Injected settings are not of type {expected}")]
    SettingsType { expected: &'static str },

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Secrets backend error: {0}")]
    Secrets(String),

    #[error("{0} environment variable is required")]
    MissingFunctionId(String),

    #[error("Lambda function '{0}' not found")]
    FunctionNotFound(String),

    #[error("Lambda function '{0}' is already registered")]
    DuplicateFunction(String),
}

impl From<reqwest::Error> for LambdaError {
    fn from(err: reqwest::Error) -> Self {
        LambdaError::Secrets(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for LambdaError {
    fn from(err: sqlx::Error) -> Self {
        LambdaError::Database(err.to_string())
    }
}

/// Classification hint carried by a [`Fault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The input had the wrong type or shape.
    InvalidInput,
    /// A remote peer could not be reached.
    Connectivity,
    /// A file or other resource does not exist.
    MissingResource,
    /// The caller is not allowed to perform the operation.
    AccessDenied,
    /// Anything else.
    Other,
}

/// A handler error with an explicit [`FaultKind`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Fault {
    kind: FaultKind,
    message: String,
}

impl Fault {
    /// Create a fault of the given kind.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidInput, message)
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Connectivity, message)
    }

    pub fn missing_resource(message: impl Into<String>) -> Self {
        Self::new(FaultKind::MissingResource, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(FaultKind::AccessDenied, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Other, message)
    }

    /// The classification hint.
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
