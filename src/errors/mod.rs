//! Fault classification, retry and partial-processing recovery.
//!
//! Nothing here raises: every fault becomes a [`ProcessingError`] record that
//! the caller decides what to do with.

pub mod handler;
pub mod models;
pub mod recovery;

pub use handler::{fault_kind, CriticalErrorDetail, ErrorHandler, ErrorSummary};
pub use models::{ErrorCategory, ErrorSeverity, ProcessingError, ProcessingResult};
pub use recovery::{
    Checkpoint, CheckpointMarker, PartialProcessingRecovery, ProcessingState, RecoveryStrategies,
};
