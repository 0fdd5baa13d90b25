//! Classified fault records and processing results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Default retry budget of a [`ProcessingError`].
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Error categories for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Database,
    FileProcessing,
    Network,
    Configuration,
    BusinessLogic,
    System,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Database => "database",
            ErrorCategory::FileProcessing => "file_processing",
            ErrorCategory::Network => "network",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::BusinessLogic => "business_logic",
            ErrorCategory::System => "system",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a record id: `{prefix}_{unix seconds}_{random}`.
pub(crate) fn generate_id(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        Utc::now().timestamp(),
        uuid::Uuid::new_v4().simple()
    )
}

/// A classified fault.
///
/// `retry_count` only moves through the retry driver and never exceeds
/// `max_retries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProcessingErrorRecord")]
pub struct ProcessingError {
    pub id: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    retry_count: u32,
    max_retries: u32,
    pub is_recoverable: bool,
}

/// Wire form of [`ProcessingError`], checked before it becomes one.
#[derive(Deserialize)]
struct ProcessingErrorRecord {
    id: String,
    category: ErrorCategory,
    severity: ErrorSeverity,
    message: String,
    #[serde(default)]
    details: Map<String, Value>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    retry_count: u32,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    #[serde(default = "default_recoverable")]
    is_recoverable: bool,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_recoverable() -> bool {
    true
}

impl TryFrom<ProcessingErrorRecord> for ProcessingError {
    type Error = String;

    fn try_from(record: ProcessingErrorRecord) -> Result<Self, Self::Error> {
        if record.retry_count > record.max_retries {
            return Err(format!(
                "retry_count {} exceeds max_retries {}",
                record.retry_count, record.max_retries
            ));
        }

        Ok(Self {
            id: record.id,
            category: record.category,
            severity: record.severity,
            message: record.message,
            details: record.details,
            timestamp: record.timestamp,
            retry_count: record.retry_count,
            max_retries: record.max_retries,
            is_recoverable: record.is_recoverable,
        })
    }
}

impl ProcessingError {
    /// A recoverable record with a fresh id and the current time.
    pub fn new(
        category: ErrorCategory,
        severity: ErrorSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self::with_id_prefix("ERR", category, severity, message)
    }

    pub(crate) fn with_id_prefix(
        prefix: &str,
        category: ErrorCategory,
        severity: ErrorSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(prefix),
            category,
            severity,
            message: message.into(),
            details: Map::new(),
            timestamp: Utc::now(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            is_recoverable: true,
        }
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self.retry_count = self.retry_count.min(max_retries);
        self
    }

    pub fn recoverable(mut self, is_recoverable: bool) -> Self {
        self.is_recoverable = is_recoverable;
        self
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Recoverable, below the retry budget and not critical.
    pub fn can_retry(&self) -> bool {
        self.is_recoverable
            && self.retry_count < self.max_retries
            && self.severity != ErrorSeverity::Critical
    }

    /// Count one retry attempt. Returns false once the budget is spent.
    pub(crate) fn record_retry(&mut self) -> bool {
        if self.retry_count >= self.max_retries {
            return false;
        }
        self.retry_count += 1;
        true
    }
}

/// Outcome of processing one or more units of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    success: bool,
    processed: u64,
    failed: u64,
    skipped: u64,
    pending: u64,
    errors: Vec<ProcessingError>,
    warnings: Vec<String>,
    #[serde(default, with = "duration_ms")]
    elapsed: Option<Duration>,
}

impl ProcessingResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    pub fn processed(mut self, count: u64) -> Self {
        self.processed = count;
        self
    }

    pub fn failures(mut self, count: u64) -> Self {
        self.failed = count;
        self
    }

    pub fn skipped(mut self, count: u64) -> Self {
        self.skipped = count;
        self
    }

    pub fn pending(mut self, count: u64) -> Self {
        self.pending = count;
        self
    }

    pub fn error(mut self, error: ProcessingError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn processed_count(&self) -> u64 {
        self.processed
    }

    pub fn failed_count(&self) -> u64 {
        self.failed
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped
    }

    pub fn pending_count(&self) -> u64 {
        self.pending
    }

    pub fn errors(&self) -> &[ProcessingError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn processing_time(&self) -> Option<Duration> {
        self.elapsed
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        value
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ErrorCategory::FileProcessing).unwrap(),
            json!("file_processing")
        );
        assert_eq!(ErrorCategory::BusinessLogic.to_string(), "business_logic");
        assert_eq!(ErrorSeverity::Critical.to_string(), "critical");
        assert!(ErrorSeverity::Critical > ErrorSeverity::High);
    }

    #[test]
    fn test_new_record_defaults() {
        let err = ProcessingError::new(ErrorCategory::Validation, ErrorSeverity::Medium, "bad");
        assert!(err.id.starts_with("ERR_"));
        assert_eq!(err.retry_count(), 0);
        assert_eq!(err.max_retries(), DEFAULT_MAX_RETRIES);
        assert!(err.is_recoverable);
        assert!(err.details.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ProcessingError::new(ErrorCategory::System, ErrorSeverity::High, "x");
        let b = ProcessingError::new(ErrorCategory::System, ErrorSeverity::High, "x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_retry_budget() {
        let mut err = ProcessingError::new(ErrorCategory::Network, ErrorSeverity::High, "down")
            .with_max_retries(2);
        assert!(err.record_retry());
        assert!(err.record_retry());
        assert!(!err.record_retry());
        assert_eq!(err.retry_count(), 2);
        assert!(!err.can_retry());
    }

    #[test]
    fn test_deserialize_checks_retry_budget() {
        let err = ProcessingError::new(ErrorCategory::Network, ErrorSeverity::High, "down")
            .with_max_retries(2);
        let mut value = serde_json::to_value(&err).unwrap();
        let restored: ProcessingError = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(restored, err);

        value["retry_count"] = json!(9);
        value["max_retries"] = json!(3);
        let rejected = serde_json::from_value::<ProcessingError>(value).unwrap_err();
        assert!(rejected
            .to_string()
            .contains("retry_count 9 exceeds max_retries 3"));
    }

    #[test]
    fn test_critical_never_retries() {
        let err = ProcessingError::new(ErrorCategory::System, ErrorSeverity::Critical, "denied");
        assert!(!err.can_retry());
    }

    #[test]
    fn test_result_builder() {
        let result = ProcessingResult::succeeded()
            .skipped(1)
            .warning("Row 7 skipped")
            .elapsed(Duration::from_millis(1500));

        assert!(result.is_success());
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.processed_count(), 0);
        assert_eq!(result.warnings(), ["Row 7 skipped".to_string()]);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["elapsed"], json!(1500));
    }
}
