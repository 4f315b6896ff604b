//! `TrajectoryStorageEngine` — the single owner of both the
//! `DatabaseManager` (read/write routing) and the `BatchWriter`
//! (batched async writes). Implements `TaskStore` and `PointReader`
//! from `trajectory-core` so the dispatcher and analyzers never touch a
//! raw `Connection` directly.

use std::path::Path;

use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::traits::{PointReader, TaskStore};
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::task::{AnalysisTask, TaskStatus, TaskType};
use trajectory_core::types::track_point::TrackPoint;

use crate::batch::BatchWriter;
use crate::connection::DatabaseManager;
use crate::queries;

pub struct TrajectoryStorageEngine {
    db: DatabaseManager,
    batch: BatchWriter,
}

impl TrajectoryStorageEngine {
    /// Open a file-backed storage engine at `path`. Runs migrations and
    /// applies pragmas on both the synchronous connection and the batch
    /// writer's dedicated connection.
    pub fn open(path: &Path) -> Result<Self, AnalysisError> {
        let db = DatabaseManager::open(path)?;
        let batch_conn = db.open_batch_connection()?;
        let batch = BatchWriter::new(batch_conn);
        Ok(Self { db, batch })
    }

    /// Open an in-memory storage engine (for tests).
    pub fn open_in_memory() -> Result<Self, AnalysisError> {
        let db = DatabaseManager::open_in_memory()?;
        let batch_conn = db.open_batch_connection()?;
        let batch = BatchWriter::new(batch_conn);
        Ok(Self { db, batch })
    }

    /// Send a `BatchCommand` to the batch writer thread.
    pub fn send_batch(&self, command: crate::batch::BatchCommand) -> Result<(), AnalysisError> {
        self.batch.send(command).map_err(AnalysisError::from)
    }

    pub fn flush_batch(&self) -> Result<(), AnalysisError> {
        self.batch.flush().map_err(AnalysisError::from)
    }

    pub fn flush_batch_sync(&self) -> Result<(), AnalysisError> {
        self.batch.flush_sync().map_err(AnalysisError::from)
    }

    pub fn checkpoint(&self) -> Result<(), AnalysisError> {
        self.db.checkpoint().map_err(AnalysisError::from)
    }

    pub fn path(&self) -> Option<&Path> {
        self.db.path()
    }

    /// Direct read access to the underlying `DatabaseManager`, for
    /// analyzers that need table-specific queries beyond `PointReader`
    /// (e.g. bucketed statistics, grid cells, stays, trips).
    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }
}

impl TaskStore for TrajectoryStorageEngine {
    fn create_task(
        &self,
        analyzer_name: &str,
        task_type: TaskType,
        parameters: serde_json::Value,
    ) -> Result<AnalysisTask, AnalysisError> {
        let now = current_timestamp();
        self.db.with_writer(|conn| {
            queries::tasks::create_task(conn, analyzer_name, task_type, parameters.clone(), now)
        })
    }

    fn get_task(&self, task_id: TaskId) -> Result<AnalysisTask, AnalysisError> {
        self.db.with_reader(|conn| queries::tasks::get_task(conn, task_id))
    }

    fn list_tasks(&self, analyzer_name: Option<&str>) -> Result<Vec<AnalysisTask>, AnalysisError> {
        self.db
            .with_reader(|conn| queries::tasks::list_tasks(conn, analyzer_name))
    }

    fn transition(&self, task_id: TaskId, next: TaskStatus) -> Result<(), AnalysisError> {
        let now = current_timestamp();
        self.db
            .with_writer(|conn| queries::tasks::transition(conn, task_id, next, now))
    }

    fn record_progress(
        &self,
        task_id: TaskId,
        processed: i64,
        failed: i64,
    ) -> Result<(), AnalysisError> {
        let now = current_timestamp();
        self.db.with_writer(|conn| {
            queries::tasks::record_progress(conn, task_id, processed, failed, now)
        })
    }

    fn record_result(
        &self,
        task_id: TaskId,
        summary: serde_json::Value,
    ) -> Result<(), AnalysisError> {
        let now = current_timestamp();
        self.db
            .with_writer(|conn| queries::tasks::record_result(conn, task_id, summary.clone(), now))
    }

    fn record_failure(&self, task_id: TaskId, message: &str) -> Result<(), AnalysisError> {
        let now = current_timestamp();
        self.db
            .with_writer(|conn| queries::tasks::record_failure(conn, task_id, message, now))
    }
}

impl PointReader for TrajectoryStorageEngine {
    fn read_points_after(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<TrackPoint>, AnalysisError> {
        self.db.with_reader(|conn| {
            queries::track_points::read_points_after(conn, after_id, limit)
                .map_err(AnalysisError::from)
        })
    }

    fn read_points_in_range(
        &self,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Vec<TrackPoint>, AnalysisError> {
        self.db.with_reader(|conn| {
            queries::track_points::read_points_in_range(conn, start_ts, end_ts)
                .map_err(AnalysisError::from)
        })
    }

    fn total_point_count(&self) -> Result<i64, AnalysisError> {
        self.db.with_reader(|conn| {
            queries::track_points::total_point_count(conn).map_err(AnalysisError::from)
        })
    }
}

/// `record_progress` and `transition` want a wall-clock timestamp; the
/// process clock, not a mockable abstraction, since task rows are
/// diagnostic/audit data rather than something tests assert exact
/// values against (spec.md §4.3).
fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_fetch_task() {
        let engine = TrajectoryStorageEngine::open_in_memory().unwrap();
        let task = engine
            .create_task("outlier_detector", TaskType::FullRecompute, serde_json::json!({}))
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        let fetched = engine.get_task(task.id).unwrap();
        assert_eq!(fetched.id, task.id);
    }

    #[test]
    fn lifecycle_transition_and_progress() {
        let engine = TrajectoryStorageEngine::open_in_memory().unwrap();
        let task = engine
            .create_task("outlier_detector", TaskType::Incremental, serde_json::json!({}))
            .unwrap();

        engine.transition(task.id, TaskStatus::Running).unwrap();
        engine.record_progress(task.id, 50, 0).unwrap();
        engine
            .record_result(task.id, serde_json::json!({"flagged": 3}))
            .unwrap();

        let final_task = engine.get_task(task.id).unwrap();
        assert_eq!(final_task.status, TaskStatus::Completed);
        assert_eq!(final_task.processed_points, 50);
    }

    #[test]
    fn invalid_transition_rejected() {
        let engine = TrajectoryStorageEngine::open_in_memory().unwrap();
        let task = engine
            .create_task("outlier_detector", TaskType::Incremental, serde_json::json!({}))
            .unwrap();

        let result = engine.transition(task.id, TaskStatus::Completed);
        assert!(result.is_err());
    }

    #[test]
    fn point_reader_paginates_by_id() {
        let engine = TrajectoryStorageEngine::open_in_memory().unwrap();
        assert_eq!(engine.total_point_count().unwrap(), 0);
        let points = engine.read_points_after(0, 100).unwrap();
        assert!(points.is_empty());
    }
}
