//! Error classification and the retry driver.
//!
//! [`ErrorHandler::classify_error`] turns any error into a
//! [`ProcessingError`] by walking its source chain. The first recognized
//! error decides the classification:
//!
//! | fault            | category          | severity   | recoverable |
//! |------------------|-------------------|------------|-------------|
//! | invalid input    | `validation`      | `medium`   | yes         |
//! | connectivity     | `network`         | `high`     | yes         |
//! | missing resource | `file_processing` | `high`     | no          |
//! | access denied    | `system`          | `critical` | no          |
//! | anything else    | `system`          | `high`     | yes         |
//!
//! The handler never raises. Retries run with linear backoff
//! (`retry_delay * attempt`) and the final record is always returned.

use super::models::{ErrorCategory, ErrorSeverity, ProcessingError, DEFAULT_MAX_RETRIES};
use crate::error::{Fault, FaultKind};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::time::Duration;
use tracing::{error, info, warn};

/// Map an error chain to a [`FaultKind`].
pub fn fault_kind(error: &anyhow::Error) -> FaultKind {
    error
        .chain()
        .find_map(kind_of)
        .unwrap_or(FaultKind::Other)
}

fn kind_of(error: &(dyn StdError + 'static)) -> Option<FaultKind> {
    if let Some(fault) = error.downcast_ref::<Fault>() {
        return Some(fault.kind());
    }
    if let Some(io_error) = error.downcast_ref::<io::Error>() {
        return io_kind(io_error.kind());
    }
    if let Some(json_error) = error.downcast_ref::<serde_json::Error>() {
        // I/O failures while reading JSON are not the input's fault.
        return (!json_error.is_io()).then_some(FaultKind::InvalidInput);
    }
    if error.is::<std::num::ParseIntError>()
        || error.is::<std::num::ParseFloatError>()
        || error.is::<std::str::ParseBoolError>()
        || error.is::<chrono::ParseError>()
    {
        return Some(FaultKind::InvalidInput);
    }
    if let Some(http_error) = error.downcast_ref::<reqwest::Error>() {
        if http_error.is_connect() || http_error.is_timeout() {
            return Some(FaultKind::Connectivity);
        }
    }
    None
}

fn io_kind(kind: io::ErrorKind) -> Option<FaultKind> {
    use io::ErrorKind::*;

    match kind {
        InvalidInput | InvalidData => Some(FaultKind::InvalidInput),
        ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected
        | AddrNotAvailable | BrokenPipe | TimedOut => Some(FaultKind::Connectivity),
        NotFound => Some(FaultKind::MissingResource),
        PermissionDenied => Some(FaultKind::AccessDenied),
        _ => None,
    }
}

/// Critical fault as reported by [`ErrorHandler::summary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalErrorDetail {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate view over every fault an [`ErrorHandler`] has handled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub total_errors: usize,
    pub error_counts_by_category: BTreeMap<ErrorCategory, usize>,
    pub critical_errors: usize,
    pub critical_error_details: Vec<CriticalErrorDetail>,
}

#[derive(Default)]
struct ErrorStats {
    counts: BTreeMap<ErrorCategory, usize>,
    critical: Vec<ProcessingError>,
}

/// Classifies faults, drives retries and keeps running totals.
pub struct ErrorHandler {
    max_retries: u32,
    retry_delay: Duration,
    stats: Mutex<ErrorStats>,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, Duration::from_secs(1))
    }
}

impl ErrorHandler {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            stats: Mutex::new(ErrorStats::default()),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Delay before retry `attempt`, saturating at [`Duration::MAX`].
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.retry_delay
            .checked_mul(attempt)
            .unwrap_or(Duration::MAX)
    }

    /// Classify `error` into a fresh record. Does not touch the totals.
    pub fn classify_error(
        &self,
        error: &anyhow::Error,
        details: Option<Map<String, Value>>,
    ) -> ProcessingError {
        let (category, severity, recoverable) = match fault_kind(error) {
            FaultKind::InvalidInput => (ErrorCategory::Validation, ErrorSeverity::Medium, true),
            FaultKind::Connectivity => (ErrorCategory::Network, ErrorSeverity::High, true),
            FaultKind::MissingResource => {
                (ErrorCategory::FileProcessing, ErrorSeverity::High, false)
            }
            FaultKind::AccessDenied => (ErrorCategory::System, ErrorSeverity::Critical, false),
            FaultKind::Other => (ErrorCategory::System, ErrorSeverity::High, true),
        };

        ProcessingError::new(category, severity, error.to_string())
            .with_details(details.unwrap_or_default())
            .with_max_retries(self.max_retries)
            .recoverable(recoverable)
    }

    /// Whether `error` is eligible for another retry.
    pub fn should_retry(&self, error: &ProcessingError) -> bool {
        error.can_retry()
    }

    /// Classify, count and log `error` without retrying.
    pub fn handle_error(
        &self,
        error: &anyhow::Error,
        details: Option<Map<String, Value>>,
    ) -> ProcessingError {
        let record = self.classify_error(error, details);
        self.track(&record);
        record
    }

    /// Classify `error`, then call `retry` while the record stays eligible.
    ///
    /// Attempt `n` sleeps `retry_delay * n` first. The record is returned as
    /// soon as a retry succeeds, or once the budget is spent.
    pub async fn handle_error_with_retry<F, Fut>(
        &self,
        error: &anyhow::Error,
        details: Option<Map<String, Value>>,
        mut retry: F,
    ) -> ProcessingError
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut record = self.handle_error(error, details);

        while self.should_retry(&record) && record.record_retry() {
            let attempt = record.retry_count();
            info!(error_id = %record.id, attempt, "Retrying operation");

            tokio::time::sleep(self.delay_for_attempt(attempt)).await;
            match retry().await {
                Ok(()) => {
                    info!(error_id = %record.id, attempt, "Retry successful");
                    return record;
                }
                Err(e) => {
                    warn!(error_id = %record.id, attempt, error = %e, "Retry failed");
                    record
                        .details
                        .insert("last_retry_error".to_string(), Value::String(e.to_string()));
                }
            }
        }

        record
    }

    fn track(&self, record: &ProcessingError) {
        let mut stats = self.stats.lock();
        *stats.counts.entry(record.category).or_insert(0) += 1;

        match record.severity {
            ErrorSeverity::Critical => {
                error!(
                    error_id = %record.id,
                    category = %record.category,
                    severity = "critical",
                    "Critical error: {}",
                    record.message
                );
                stats.critical.push(record.clone());
            }
            ErrorSeverity::High => error!(
                error_id = %record.id,
                category = %record.category,
                "High severity error: {}",
                record.message
            ),
            ErrorSeverity::Medium => warn!(
                error_id = %record.id,
                category = %record.category,
                "Medium severity error: {}",
                record.message
            ),
            ErrorSeverity::Low => info!(
                error_id = %record.id,
                category = %record.category,
                "Low severity error: {}",
                record.message
            ),
        }
    }

    /// Totals since creation or the last [`reset`](Self::reset).
    pub fn summary(&self) -> ErrorSummary {
        let stats = self.stats.lock();
        ErrorSummary {
            total_errors: stats.counts.values().sum(),
            error_counts_by_category: stats.counts.clone(),
            critical_errors: stats.critical.len(),
            critical_error_details: stats
                .critical
                .iter()
                .map(|e| CriticalErrorDetail {
                    id: e.id.clone(),
                    message: e.message.clone(),
                    timestamp: e.timestamp,
                })
                .collect(),
        }
    }

    pub fn reset(&self) {
        *self.stats.lock() = ErrorStats::default();
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}
