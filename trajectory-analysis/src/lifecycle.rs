//! Task lifecycle manager (spec.md §4.3): owns the state-machine rules
//! around an `AnalysisTask` row, delegating persistence to a `TaskStore`.
//!
//! Kept as a thin wrapper rather than folded into the dispatcher so the
//! transition rules (and their tests) stand alone, mirroring the
//! teacher's preference for one-concern-per-module (`DetectorRegistry`
//! vs. `DetectionContext` vs. the engine pipeline).

use std::sync::Arc;

use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::traits::TaskStore;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::task::{AnalysisTask, TaskStatus, TaskType};

pub struct TaskLifecycleManager {
    store: Arc<dyn TaskStore>,
}

impl TaskLifecycleManager {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn create(
        &self,
        analyzer_name: &str,
        task_type: TaskType,
        parameters: serde_json::Value,
    ) -> Result<AnalysisTask, AnalysisError> {
        self.store.create_task(analyzer_name, task_type, parameters)
    }

    pub fn get(&self, task_id: TaskId) -> Result<AnalysisTask, AnalysisError> {
        self.store.get_task(task_id)
    }

    pub fn list(&self, analyzer_name: Option<&str>) -> Result<Vec<AnalysisTask>, AnalysisError> {
        self.store.list_tasks(analyzer_name)
    }

    /// `pending -> running`. The only transition that gives a worker
    /// ownership of the task row (spec.md §3 "Ownership").
    pub fn start(&self, task_id: TaskId) -> Result<(), AnalysisError> {
        self.store.transition(task_id, TaskStatus::Running)
    }

    /// Progress writes must be idempotent under crash-and-retry
    /// (spec.md §4.3); `TaskStore::record_progress` enforces that via a
    /// monotonic `MAX()` update, not this caller.
    pub fn report_progress(
        &self,
        task_id: TaskId,
        processed: i64,
        failed: i64,
    ) -> Result<(), AnalysisError> {
        self.store.record_progress(task_id, processed, failed)
    }

    /// `running -> completed`, populating the result summary and
    /// setting `progress_percent = 100` (spec.md §4.3).
    pub fn complete(
        &self,
        task_id: TaskId,
        summary: serde_json::Value,
    ) -> Result<(), AnalysisError> {
        self.store.transition(task_id, TaskStatus::Completed)?;
        self.store.record_result(task_id, summary)
    }

    /// `running -> failed`. `failed_points` is an advisory counter, not
    /// an error log; the message itself is the sole user-visible error
    /// channel (spec.md §4.3, §7).
    pub fn fail(&self, task_id: TaskId, message: &str) -> Result<(), AnalysisError> {
        self.store.transition(task_id, TaskStatus::Failed)?;
        self.store.record_failure(task_id, message)
    }

    /// Cooperative cancellation request. Does not itself stop the
    /// worker thread — the analyzer's batch loop observes this via a
    /// `CancellationToken` and exits on its own (spec.md §5).
    pub fn cancel(&self, task_id: TaskId) -> Result<(), AnalysisError> {
        self.store.transition(task_id, TaskStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trajectory_storage::TrajectoryStorageEngine;

    fn manager() -> TaskLifecycleManager {
        let engine = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        TaskLifecycleManager::new(engine)
    }

    #[test]
    fn happy_path_completes() {
        let mgr = manager();
        let task = mgr
            .create("outlier_detection", TaskType::Incremental, serde_json::json!({}))
            .unwrap();
        mgr.start(task.id).unwrap();
        mgr.report_progress(task.id, 10, 0).unwrap();
        mgr.complete(task.id, serde_json::json!({"flagged": 2})).unwrap();

        let fetched = mgr.get(task.id).unwrap();
        assert_eq!(fetched.status, TaskStatus::Completed);
        assert_eq!(fetched.progress_percent, 100.0);
    }

    #[test]
    fn failure_records_message() {
        let mgr = manager();
        let task = mgr
            .create("outlier_detection", TaskType::Incremental, serde_json::json!({}))
            .unwrap();
        mgr.start(task.id).unwrap();
        mgr.fail(task.id, "precondition broken").unwrap();

        let fetched = mgr.get(task.id).unwrap();
        assert_eq!(fetched.status, TaskStatus::Failed);
        assert_eq!(fetched.error_message.as_deref(), Some("precondition broken"));
    }

    #[test]
    fn cancel_from_pending() {
        let mgr = manager();
        let task = mgr
            .create("outlier_detection", TaskType::Incremental, serde_json::json!({}))
            .unwrap();
        mgr.cancel(task.id).unwrap();
        let fetched = mgr.get(task.id).unwrap();
        assert_eq!(fetched.status, TaskStatus::Cancelled);
    }
}
