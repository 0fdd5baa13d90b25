//! Tracing subscriber setup.
//!
//! `RUST_LOG` selects the filter (default `info`). Set
//! `ASYNC_LAMBDA_LOG_FORMAT=json` for one JSON object per line, which is what
//! CloudWatch log insights expects. ANSI colors are off inside Lambda.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Variable selecting the output format (`json` or `text`).
pub const LOG_FORMAT_ENV: &str = "ASYNC_LAMBDA_LOG_FORMAT";

/// Output format of [`init_tracing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing() {
    init_tracing_with(LogFormat::from_env());
}

/// Install the global subscriber with an explicit format.
pub fn init_tracing_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let ansi = std::env::var_os("AWS_LAMBDA_FUNCTION_NAME").is_none();

    let layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_ansi(ansi)
            .with_filter(filter)
            .boxed(),
    };

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        tracing::debug!("Global tracing subscriber already initialized");
    }
}
