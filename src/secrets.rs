//! Secrets lookups for settings.
//!
//! A [`SecretsBackend`] never fails: any backend error is logged and
//! reported as an empty string, so a missing secret degrades to an empty
//! setting instead of a failed invocation.

use crate::error::LambdaError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info};

/// Port variable of the AWS Parameters and Secrets Lambda extension.
pub const EXTENSION_PORT_ENV: &str = "PARAMETERS_SECRETS_EXTENSION_HTTP_PORT";

/// Default port of the extension.
pub const DEFAULT_EXTENSION_PORT: u16 = 2773;

const TOKEN_HEADER: &str = "X-Aws-Parameters-Secrets-Token";

/// A source of secret values.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    /// The secret named `name`, or one field of it when `key` is given and
    /// the secret is a JSON object. Empty on any failure.
    async fn get_secret(&self, name: &str, key: Option<&str>) -> String;
}

/// Pick `key` out of a secret string.
///
/// JSON objects yield the field (strings unquoted), or empty when the field
/// is absent. Other JSON yields empty. Non-JSON secrets are returned whole.
pub fn extract_key(secret: &str, key: Option<&str>) -> String {
    let Some(key) = key else {
        return secret.to_string();
    };
    if secret.is_empty() {
        return String::new();
    }

    match serde_json::from_str::<Value>(secret) {
        Ok(Value::Object(fields)) => match fields.get(key) {
            Some(Value::String(value)) => value.clone(),
            Some(value) => value.to_string(),
            None => String::new(),
        },
        Ok(_) => String::new(),
        Err(_) => secret.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    #[serde(default)]
    secret_string: Option<String>,
}

/// Reads secrets through the AWS Parameters and Secrets Lambda extension.
#[derive(Debug, Clone)]
pub struct ExtensionSecretsBackend {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl ExtensionSecretsBackend {
    /// Backend for the extension on `localhost`, configured from the
    /// environment.
    pub fn from_env() -> Result<Self, LambdaError> {
        let port = std::env::var(EXTENSION_PORT_ENV)
            .ok()
            .and_then(|port| port.parse::<u16>().ok())
            .unwrap_or(DEFAULT_EXTENSION_PORT);
        let token = std::env::var("AWS_SESSION_TOKEN").ok();

        Self::new(format!("http://localhost:{}", port), token)
    }

    /// Backend for an extension listening at `base_url`.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, LambdaError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(format!("async-lambda/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = base_url.into();
        info!(base_url = %base_url, token = token.is_some(), "Created secrets extension client");

        Ok(Self {
            client,
            endpoint: format!("{}/secretsmanager/get", base_url.trim_end_matches('/')),
            token,
        })
    }

    async fn fetch(&self, name: &str) -> Result<String, LambdaError> {
        let mut request = self.client.get(&self.endpoint).query(&[("secretId", name)]);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await?.error_for_status()?;
        let body: GetSecretValueResponse = response.json().await?;
        Ok(body.secret_string.unwrap_or_default())
    }
}

#[async_trait]
impl SecretsBackend for ExtensionSecretsBackend {
    async fn get_secret(&self, name: &str, key: Option<&str>) -> String {
        if name.is_empty() {
            return String::new();
        }

        match self.fetch(name).await {
            Ok(secret) => {
                debug!(secret = %name, "Fetched secret");
                extract_key(&secret, key)
            }
            Err(e) => {
                error!(secret = %name, error = %e, "Error fetching secret");
                String::new()
            }
        }
    }
}

/// In-memory secrets for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretsBackend {
    secrets: HashMap<String, String>,
}

impl StaticSecretsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretsBackend for StaticSecretsBackend {
    async fn get_secret(&self, name: &str, key: Option<&str>) -> String {
        match self.secrets.get(name) {
            Some(secret) => extract_key(secret, key),
            None => String::new(),
        }
    }
}
