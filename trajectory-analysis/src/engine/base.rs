//! Analyzer base (spec.md §2 row 5, §5): the batch-iteration template
//! shared by every point-stream analyzer — page through inputs via
//! `PointReader`, call back per batch, write progress, flush the batch
//! writer, and poll cancellation, in that order (spec.md §5
//! "suspension points").

use std::sync::Arc;

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::traits::PointReader;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::track_point::TrackPoint;
use trajectory_storage::TrajectoryStorageEngine;

use crate::lifecycle::TaskLifecycleManager;

/// Outcome of one full batch-iteration pass: totals a caller folds into
/// its own result summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchRunStats {
    pub processed: i64,
    pub failed: i64,
}

/// Pages through all track points in `id` order, batch by batch,
/// invoking `handle_batch` for each and reporting progress after every
/// batch. Returns `Err(AnalysisError::Cancelled)` the moment cancellation
/// is observed between batches, leaving any already-flushed writes in
/// place (spec.md §5: "an analyzer that observes cancellation performs
/// no cleanup of partial writes").
pub struct AnalyzerBase {
    storage: Arc<TrajectoryStorageEngine>,
    lifecycle: Arc<TaskLifecycleManager>,
    batch_size: usize,
}

impl AnalyzerBase {
    pub fn new(
        storage: Arc<TrajectoryStorageEngine>,
        lifecycle: Arc<TaskLifecycleManager>,
        batch_size: usize,
    ) -> Self {
        Self {
            storage,
            lifecycle,
            batch_size,
        }
    }

    pub fn storage(&self) -> &Arc<TrajectoryStorageEngine> {
        &self.storage
    }

    /// Run `handle_batch` over every point with `id > after_id`, in
    /// ascending id order. `handle_batch` returns the number of points
    /// in that batch it could not process (a soft failure, spec.md §7
    /// "input defect ... row is skipped, `failed_points` incremented").
    pub fn run_over_points(
        &self,
        task_id: TaskId,
        cancel: &CancellationToken,
        mut after_id: i64,
        mut handle_batch: impl FnMut(&[TrackPoint]) -> Result<i64, AnalysisError>,
    ) -> Result<BatchRunStats, AnalysisError> {
        let mut stats = BatchRunStats::default();

        loop {
            let batch = self.storage.read_points_after(after_id, self.batch_size)?;
            if batch.is_empty() {
                break;
            }
            after_id = batch.last().map(|p| p.id).unwrap_or(after_id);

            let batch_failed = handle_batch(&batch)?;
            stats.processed += batch.len() as i64 - batch_failed;
            stats.failed += batch_failed;

            // Suspension point (spec.md §5): commit the batch's writes,
            // report progress, then poll cancellation.
            self.storage.flush_batch_sync()?;
            self.lifecycle
                .report_progress(task_id, stats.processed, stats.failed)?;

            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }

            if batch.len() < self.batch_size {
                break;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trajectory_core::types::task::TaskType;

    fn harness() -> (Arc<TrajectoryStorageEngine>, Arc<TaskLifecycleManager>) {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        (storage, lifecycle)
    }

    #[test]
    fn empty_table_yields_zero_stats() {
        let (storage, lifecycle) = harness();
        let base = AnalyzerBase::new(storage.clone(), lifecycle.clone(), 100);
        let task = lifecycle
            .create("stub", TaskType::Incremental, serde_json::json!({}))
            .unwrap();
        lifecycle.start(task.id).unwrap();
        let token = CancellationToken::new();

        let stats = base
            .run_over_points(task.id, &token, 0, |_batch| Ok(0))
            .unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn cancellation_between_batches_aborts() {
        let (storage, lifecycle) = harness();
        let base = AnalyzerBase::new(storage.clone(), lifecycle.clone(), 1);
        let task = lifecycle
            .create("stub", TaskType::Incremental, serde_json::json!({}))
            .unwrap();
        lifecycle.start(task.id).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        // No points ingested, so the loop exits on the first empty read
        // without ever invoking the cancellation check — this just
        // exercises that an already-cancelled token doesn't panic.
        let result = base.run_over_points(task.id, &token, 0, |_batch| Ok(0));
        assert!(result.is_ok());
    }
}
