//! Errors surfaced by the analyzer registry, lifecycle manager, and
//! dispatcher. A task's terminal error message is the `Display` of
//! one of these, stored verbatim in the task row.

use super::error_code::{self, ErrorCode};
use super::storage_error::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("analyzer '{name}' is not registered")]
    AnalyzerNotFound { name: String },

    #[error("analyzer '{name}' is already registered")]
    AlreadyRegistered { name: String },

    #[error("task {task_id} not found")]
    TaskNotFound { task_id: i64 },

    #[error("task {task_id} is {actual}, expected {expected}")]
    InvalidTaskState {
        task_id: i64,
        actual: String,
        expected: String,
    },

    #[error("precondition failed: {reason}")]
    PreconditionFailed { reason: String },

    #[error("external worker failed: {detail}")]
    WorkerFailed { detail: String },

    #[error("task was cancelled")]
    Cancelled,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for AnalysisError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AnalyzerNotFound { .. } => error_code::ANALYZER_NOT_FOUND,
            Self::AlreadyRegistered { .. } => error_code::ANALYZER_ALREADY_REGISTERED,
            Self::TaskNotFound { .. } => error_code::TASK_NOT_FOUND,
            Self::InvalidTaskState { .. } => error_code::INVALID_TASK_STATE,
            Self::PreconditionFailed { .. } => error_code::PRECONDITION_FAILED,
            Self::WorkerFailed { .. } => error_code::WORKER_FAILED,
            Self::Cancelled => error_code::CANCELLED,
            Self::Storage(e) => e.error_code(),
        }
    }
}
