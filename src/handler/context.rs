//! Invocation context passed through to handlers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Invocation metadata from the host runtime.
///
/// The adapter never inspects it; it is handed to the handler unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LambdaContext {
    /// Request ID for tracing.
    pub request_id: String,
    /// Function name.
    pub function_name: String,
    /// Function version.
    pub function_version: String,
    /// ARN used to invoke the function.
    pub invoked_function_arn: String,
    /// Configured memory in MB.
    pub memory_limit_mb: u32,
    /// Invocation deadline in milliseconds since the Unix epoch.
    pub deadline_ms: u64,
    pub log_group_name: String,
    pub log_stream_name: String,
    /// Extra environment available to the handler.
    pub env: HashMap<String, String>,
}

impl LambdaContext {
    /// Create a new context.
    pub fn new(function_name: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            request_id: request_id.into(),
            ..Self::default()
        }
    }

    /// Fill function metadata from the standard `AWS_LAMBDA_*` variables.
    pub fn from_env(request_id: impl Into<String>) -> Self {
        let var = |key: &str| std::env::var(key).unwrap_or_default();
        Self {
            request_id: request_id.into(),
            function_name: var("AWS_LAMBDA_FUNCTION_NAME"),
            function_version: var("AWS_LAMBDA_FUNCTION_VERSION"),
            memory_limit_mb: var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE").parse().unwrap_or(0),
            log_group_name: var("AWS_LAMBDA_LOG_GROUP_NAME"),
            log_stream_name: var("AWS_LAMBDA_LOG_STREAM_NAME"),
            ..Self::default()
        }
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the deadline relative to now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.deadline_ms = now_ms().saturating_add(timeout_ms);
        self
    }

    /// Get an environment variable.
    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.env.get(key)
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining_time(&self) -> Option<Duration> {
        if self.deadline_ms == 0 {
            return None;
        }
        Some(Duration::from_millis(self.deadline_ms.saturating_sub(now_ms())))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
