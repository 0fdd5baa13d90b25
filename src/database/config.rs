//! Connection pool configuration.

use crate::error::LambdaError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable read when no URL is configured explicitly.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Pool settings sized for short-lived serverless invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL. Falls back to `DATABASE_URL`.
    pub url: Option<String>,
    /// Steady-state pool size.
    pub pool_size: u32,
    /// Extra connections allowed above `pool_size`.
    pub max_overflow: u32,
    /// Seconds before a connection is recycled.
    pub pool_recycle: u64,
    /// Check connections before handing them out.
    pub pre_ping: bool,
    /// Log every statement.
    pub echo: bool,
    /// Application name reported to the server.
    pub application_name: String,
    /// Connect timeout in seconds.
    pub connect_timeout: u64,
    /// Statement timeout in seconds.
    pub command_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 2,
            max_overflow: 3,
            pool_recycle: 300,
            pre_ping: true,
            echo: false,
            application_name: "async_aws_lambda".to_string(),
            connect_timeout: 10,
            command_timeout: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the pool size and overflow.
    pub fn pool_size(mut self, pool_size: u32, max_overflow: u32) -> Self {
        self.pool_size = pool_size;
        self.max_overflow = max_overflow;
        self
    }

    /// Set the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Enable statement logging.
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Upper bound on open connections.
    pub fn max_connections(&self) -> u32 {
        self.pool_size.saturating_add(self.max_overflow).max(1)
    }

    pub fn recycle_after(&self) -> Duration {
        Duration::from_secs(self.pool_recycle)
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// The configured URL, or `DATABASE_URL`.
    pub fn resolve_url(&self) -> Result<String, LambdaError> {
        self.url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| std::env::var(DATABASE_URL_ENV).ok().filter(|url| !url.is_empty()))
            .ok_or_else(|| {
                LambdaError::Configuration(format!(
                    "{} environment variable or database url required",
                    DATABASE_URL_ENV
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_serverless_sizing() {
        let config = DatabaseConfig::default();
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.max_overflow, 3);
        assert_eq!(config.max_connections(), 5);
        assert_eq!(config.recycle_after(), Duration::from_secs(300));
        assert!(config.pre_ping);
    }

    #[test]
    fn test_explicit_url_wins() {
        let config = DatabaseConfig::new().url("postgres://localhost/app");
        assert_eq!(config.resolve_url().unwrap(), "postgres://localhost/app");
    }

    #[test]
    fn test_empty_pool_still_allows_one_connection() {
        let config = DatabaseConfig::new().pool_size(0, 0);
        assert_eq!(config.max_connections(), 1);
    }
}
