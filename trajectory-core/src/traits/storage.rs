//! Storage-facing traits. These define the contract between
//! `trajectory-analysis`'s dispatcher/lifecycle manager and whatever
//! persists `AnalysisTask` rows and track points — the SQLite-backed
//! implementation lives in `trajectory-storage`. Mirrors the teacher's
//! `IDrift*` split: one object-safe trait per concern, `Send + Sync` so
//! they can be shared behind an `Arc` across worker threads.

use crate::errors::analysis_error::AnalysisError;
use crate::types::identifiers::TaskId;
use crate::types::task::{AnalysisTask, TaskStatus, TaskType};
use crate::types::track_point::TrackPoint;

/// Persists and mutates `AnalysisTask` control-plane rows
/// (spec.md §4.3's lifecycle state machine).
pub trait TaskStore: Send + Sync {
    fn create_task(
        &self,
        analyzer_name: &str,
        task_type: TaskType,
        parameters: serde_json::Value,
    ) -> Result<AnalysisTask, AnalysisError>;

    fn get_task(&self, task_id: TaskId) -> Result<AnalysisTask, AnalysisError>;

    fn list_tasks(&self, analyzer_name: Option<&str>) -> Result<Vec<AnalysisTask>, AnalysisError>;

    /// Move a task to `next`, validated against
    /// `TaskStatus::can_transition_to`. Rejects invalid transitions
    /// rather than silently clamping them.
    fn transition(&self, task_id: TaskId, next: TaskStatus) -> Result<(), AnalysisError>;

    /// Record progress. Implementations must make this idempotent under
    /// a crash-and-retry of the same batch (spec.md §5).
    fn record_progress(
        &self,
        task_id: TaskId,
        processed: i64,
        failed: i64,
    ) -> Result<(), AnalysisError>;

    fn record_result(
        &self,
        task_id: TaskId,
        summary: serde_json::Value,
    ) -> Result<(), AnalysisError>;

    fn record_failure(&self, task_id: TaskId, message: &str) -> Result<(), AnalysisError>;
}

/// Read access to track points, batched so analyzers never have to
/// materialize an entire point history in memory (spec.md §5).
pub trait PointReader: Send + Sync {
    /// Points with `id > after_id`, ordered by `id`, up to `limit` rows.
    /// Analyzers page through a full table by repeatedly advancing
    /// `after_id` to the last returned point's id.
    fn read_points_after(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<TrackPoint>, AnalysisError>;

    /// Points in `[start_ts, end_ts)`, ordered by timestamp — the shape
    /// incremental analyzers use to pick up where a prior run left off.
    fn read_points_in_range(
        &self,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Vec<TrackPoint>, AnalysisError>;

    fn total_point_count(&self) -> Result<i64, AnalysisError>;
}
