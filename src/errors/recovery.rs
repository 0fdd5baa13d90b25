//! Checkpointing and recovery strategies for row-oriented processing.

use super::models::{ErrorCategory, ProcessingError, ProcessingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use tracing::{error, info, warn};

/// A saved progress marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub row_number: u64,
    pub processed_count: u64,
    pub failed_count: u64,
    pub timestamp: DateTime<Utc>,
}

/// The part of a checkpoint needed to resume.
///
/// A marker without a row number (an empty `{}` in persisted state) counts
/// as no checkpoint at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_number: Option<u64>,
}

impl From<&Checkpoint> for CheckpointMarker {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            row_number: Some(checkpoint.row_number),
        }
    }
}

/// Persisted processing state, as read back from wherever the caller keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingState {
    #[serde(default)]
    pub last_checkpoint: Option<CheckpointMarker>,
    #[serde(default)]
    pub last_parsed_row: Option<u64>,
}

/// Tracks checkpoints for resumable processing of large inputs.
///
/// Only the most recent checkpoint is kept.
#[derive(Debug, Clone)]
pub struct PartialProcessingRecovery {
    checkpoint_interval: u64,
    last_checkpoint: Option<Checkpoint>,
}

impl Default for PartialProcessingRecovery {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PartialProcessingRecovery {
    pub fn new(checkpoint_interval: u64) -> Self {
        Self {
            checkpoint_interval,
            last_checkpoint: None,
        }
    }

    pub fn checkpoint_interval(&self) -> u64 {
        self.checkpoint_interval
    }

    /// True on every multiple of the interval. An interval of 0 never
    /// checkpoints.
    pub fn should_checkpoint(&self, row_number: u64) -> bool {
        self.checkpoint_interval != 0 && row_number % self.checkpoint_interval == 0
    }

    /// Record a checkpoint, replacing the previous one.
    ///
    /// The id is `CP_{unix_seconds}_{row_number}`.
    pub fn checkpoint(&mut self, row_number: u64, processed: u64, failed: u64) -> Checkpoint {
        let timestamp = Utc::now();
        let checkpoint = Checkpoint {
            checkpoint_id: format!("CP_{}_{}", timestamp.timestamp(), row_number),
            row_number,
            processed_count: processed,
            failed_count: failed,
            timestamp,
        };
        info!(row_number, processed, failed, "Created checkpoint at row {}", row_number);

        self.last_checkpoint = Some(checkpoint.clone());
        checkpoint
    }

    pub fn last_checkpoint(&self) -> Option<&Checkpoint> {
        self.last_checkpoint.as_ref()
    }

    /// The state to persist for a later [`recovery_point`](Self::recovery_point).
    pub fn state(&self, last_parsed_row: Option<u64>) -> ProcessingState {
        ProcessingState {
            last_checkpoint: self.last_checkpoint.as_ref().map(CheckpointMarker::from),
            last_parsed_row,
        }
    }

    /// Row to resume from: the last checkpoint, else the last parsed row,
    /// else 0.
    pub fn recovery_point(&self, state: Option<&ProcessingState>) -> u64 {
        let Some(state) = state else {
            return 0;
        };
        state
            .last_checkpoint
            .and_then(|checkpoint| checkpoint.row_number)
            .or(state.last_parsed_row)
            .unwrap_or(0)
    }
}

/// Ways to carry on after a row fails.
pub struct RecoveryStrategies;

impl RecoveryStrategies {
    /// Skip the row.
    pub async fn skip_row(
        error: ProcessingError,
        _row: &Value,
        row_number: u64,
    ) -> ProcessingResult {
        warn!(
            row_number,
            error_id = %error.id,
            "Skipping row {} due to error: {}",
            row_number,
            error.message
        );

        let warning = format!("Row {} skipped: {}", row_number, error.message);
        ProcessingResult::succeeded()
            .skipped(1)
            .error(error)
            .warning(warning)
    }

    /// Count the row as processed with whatever data survived.
    pub async fn partial_data(
        error: ProcessingError,
        _row: &Value,
        row_number: u64,
    ) -> ProcessingResult {
        warn!(
            row_number,
            error_id = %error.id,
            "Processing row {} with partial data due to: {}",
            row_number,
            error.message
        );

        ProcessingResult::succeeded()
            .processed(1)
            .error(error)
            .warning(format!("Row {} processed with partial data", row_number))
    }

    /// Run `fallback` on the row.
    ///
    /// When the fallback fails too, the result carries both the original
    /// record and a `business_logic` record for the fallback failure.
    pub async fn fallback<F, Fut>(
        error: ProcessingError,
        row: &Value,
        row_number: u64,
        fallback: F,
    ) -> ProcessingResult
    where
        F: FnOnce(&Value, u64) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        info!(row_number, "Using fallback processing for row {}", row_number);

        match fallback(row, row_number).await {
            Ok(()) => ProcessingResult::succeeded()
                .processed(1)
                .warning(format!("Row {} processed using fallback method", row_number)),
            Err(fallback_error) => {
                error!(row_number, error = %fallback_error, "Fallback processing also failed");

                let nested = ProcessingError::with_id_prefix(
                    "FALLBACK",
                    ErrorCategory::BusinessLogic,
                    error.severity,
                    format!("Fallback processing failed: {}", fallback_error),
                );
                ProcessingResult::failed()
                    .failures(1)
                    .error(error)
                    .error(nested)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::models::ErrorSeverity;
    use anyhow::anyhow;
    use serde_json::json;

    fn row_error() -> ProcessingError {
        ProcessingError::new(ErrorCategory::Validation, ErrorSeverity::Medium, "bad date")
    }

    #[test]
    fn test_should_checkpoint_on_interval() {
        let recovery = PartialProcessingRecovery::new(100);
        assert!(recovery.should_checkpoint(100));
        assert!(recovery.should_checkpoint(0));
        assert!(!recovery.should_checkpoint(150));
        assert!(!PartialProcessingRecovery::new(0).should_checkpoint(100));
    }

    #[test]
    fn test_recovery_point_preference() {
        let recovery = PartialProcessingRecovery::new(100);
        let state: ProcessingState =
            serde_json::from_value(json!({ "last_checkpoint": { "row_number": 500 } })).unwrap();
        assert_eq!(recovery.recovery_point(Some(&state)), 500);

        let state = ProcessingState {
            last_checkpoint: None,
            last_parsed_row: Some(42),
        };
        assert_eq!(recovery.recovery_point(Some(&state)), 42);
        assert_eq!(recovery.recovery_point(Some(&ProcessingState::default())), 0);
        assert_eq!(recovery.recovery_point(None), 0);
    }

    #[test]
    fn test_empty_checkpoint_falls_back_to_parsed_row() {
        let recovery = PartialProcessingRecovery::new(100);
        let state: ProcessingState =
            serde_json::from_value(json!({ "last_checkpoint": {}, "last_parsed_row": 42 }))
                .unwrap();
        assert_eq!(state.last_checkpoint, Some(CheckpointMarker::default()));
        assert_eq!(recovery.recovery_point(Some(&state)), 42);

        let state: ProcessingState =
            serde_json::from_value(json!({ "last_checkpoint": { "row_number": 0 } })).unwrap();
        assert_eq!(recovery.recovery_point(Some(&state)), 0);
    }

    #[test]
    fn test_checkpoint_overwrites() {
        let mut recovery = PartialProcessingRecovery::default();
        recovery.checkpoint(100, 98, 2);
        let latest = recovery.checkpoint(200, 197, 3);

        assert_eq!(recovery.last_checkpoint(), Some(&latest));
        assert!(latest.checkpoint_id.starts_with("CP_"));
        assert!(latest.checkpoint_id.ends_with("_200"));
        assert_eq!(
            latest.checkpoint_id,
            format!("CP_{}_200", latest.timestamp.timestamp())
        );

        let state = recovery.state(Some(250));
        assert_eq!(recovery.recovery_point(Some(&state)), 200);
    }

    #[tokio::test]
    async fn test_skip_row() {
        let result = RecoveryStrategies::skip_row(row_error(), &json!({}), 7).await;
        assert!(result.is_success());
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.warnings(), ["Row 7 skipped: bad date".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_data() {
        let result = RecoveryStrategies::partial_data(row_error(), &json!({}), 8).await;
        assert!(result.is_success());
        assert_eq!(result.processed_count(), 1);
        assert_eq!(
            result.warnings(),
            ["Row 8 processed with partial data".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fallback_success() {
        let result = RecoveryStrategies::fallback(row_error(), &json!({"a": 1}), 9, |row, _| {
            let ok = row["a"] == json!(1);
            async move {
                anyhow::ensure!(ok, "unexpected row");
                Ok(())
            }
        })
        .await;

        assert!(result.is_success());
        assert_eq!(result.processed_count(), 1);
        assert!(result.errors().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_failure_keeps_both_records() {
        let original = row_error();
        let result = RecoveryStrategies::fallback(original.clone(), &json!({}), 10, |_, _| async {
            Err(anyhow!("no fallback"))
        })
        .await;

        assert!(!result.is_success());
        assert_eq!(result.failed_count(), 1);
        let errors = result.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], original);
        assert_eq!(errors[1].category, ErrorCategory::BusinessLogic);
        assert_eq!(errors[1].severity, ErrorSeverity::Medium);
        assert_eq!(errors[1].message, "Fallback processing failed: no fallback");
        assert!(errors[1].id.starts_with("FALLBACK_"));
    }
}
