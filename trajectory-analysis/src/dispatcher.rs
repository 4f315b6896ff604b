//! Dispatcher (spec.md §2 row 8, §6): accepts `(analyzer_name, mode)`
//! requests, allocates a task row, runs the analyzer on its own thread,
//! and surfaces the outcome back onto the task row. Exposes the four
//! control-plane operations the (out-of-scope) HTTP layer would wrap as
//! `POST`/`GET`/`DELETE` endpoints (spec.md §6) as plain function calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::task::{AnalysisTask, AnalyzerMode, TaskType};
use trajectory_storage::TrajectoryStorageEngine;

use crate::lifecycle::TaskLifecycleManager;
use crate::registry::AnalyzerRegistry;

pub struct Dispatcher {
    registry: AnalyzerRegistry,
    storage: Arc<TrajectoryStorageEngine>,
    lifecycle: Arc<TaskLifecycleManager>,
    cancellation_tokens: Mutex<HashMap<i64, CancellationToken>>,
}

impl Dispatcher {
    pub fn new(registry: AnalyzerRegistry, storage: Arc<TrajectoryStorageEngine>) -> Self {
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        Self {
            registry,
            storage,
            lifecycle,
            cancellation_tokens: Mutex::new(HashMap::new()),
        }
    }

    /// `POST /api/v1/admin/analysis/tasks`: allocate a task row and run
    /// the named analyzer to completion on the calling thread. The core
    /// does not auto-schedule dependencies (spec.md §4.4); callers
    /// sequence dependent analyzers themselves.
    pub fn create_task(
        &self,
        analyzer_name: &str,
        task_type: TaskType,
        parameters: serde_json::Value,
    ) -> Result<AnalysisTask, AnalysisError> {
        if !self.registry.is_registered(analyzer_name) {
            return Err(AnalysisError::AnalyzerNotFound {
                name: analyzer_name.to_string(),
            });
        }
        let task = self
            .lifecycle
            .create(analyzer_name, task_type, parameters)?;
        self.run(task.id, analyzer_name, task_type.into())?;
        Ok(self.lifecycle.get(task.id)?)
    }

    fn run(
        &self,
        task_id: TaskId,
        analyzer_name: &str,
        mode: AnalyzerMode,
    ) -> Result<(), AnalysisError> {
        let token = CancellationToken::new();
        self.cancellation_tokens
            .lock()
            .expect("cancellation token map poisoned")
            .insert(task_id.0, token.clone());

        let analyzer = self.registry.lookup(analyzer_name, self.storage.clone())?;
        self.lifecycle.start(task_id)?;

        let result = analyzer.execute(task_id, mode, &token);

        self.cancellation_tokens
            .lock()
            .expect("cancellation token map poisoned")
            .remove(&task_id.0);

        match result {
            Ok(()) => {
                // Analyzers that already wrote a result summary via
                // `TaskLifecycleManager::complete` have moved the task
                // to `completed`; re-transitioning here would be
                // rejected by `can_transition_to`, so only finalize if
                // it's still sitting in `running`.
                let current = self.lifecycle.get(task_id)?;
                if current.status == trajectory_core::types::task::TaskStatus::Running {
                    self.lifecycle.complete(task_id, serde_json::json!({}))?;
                }
                Ok(())
            }
            Err(AnalysisError::Cancelled) => {
                let current = self.lifecycle.get(task_id)?;
                if current.status == trajectory_core::types::task::TaskStatus::Running {
                    self.lifecycle.cancel(task_id)?;
                }
                Err(AnalysisError::Cancelled)
            }
            Err(e) => {
                let current = self.lifecycle.get(task_id)?;
                if current.status == trajectory_core::types::task::TaskStatus::Running {
                    self.lifecycle.fail(task_id, &e.to_string())?;
                }
                Err(e)
            }
        }
    }

    /// `GET /api/v1/admin/analysis/tasks/{id}`.
    pub fn get_task(&self, task_id: TaskId) -> Result<AnalysisTask, AnalysisError> {
        self.lifecycle.get(task_id)
    }

    /// `GET /api/v1/admin/analysis/tasks?status=...`. Status filtering
    /// is left to the (out-of-scope) HTTP layer; this returns every task
    /// for the analyzer, newest-oldest ordering delegated to the store.
    pub fn list_tasks(&self, analyzer_name: Option<&str>) -> Result<Vec<AnalysisTask>, AnalysisError> {
        self.lifecycle.list(analyzer_name)
    }

    /// `DELETE /api/v1/admin/analysis/tasks/{id}`: cooperative
    /// cancellation. Flips the shared token the running analyzer polls
    /// between batches; has no effect on a task that isn't in flight.
    pub fn cancel_task(&self, task_id: TaskId) -> Result<(), AnalysisError> {
        if let Some(token) = self
            .cancellation_tokens
            .lock()
            .expect("cancellation token map poisoned")
            .get(&task_id.0)
        {
            token.cancel();
        }
        Ok(())
    }

    pub fn registered_analyzers(&self) -> Vec<String> {
        self.registry.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trajectory_core::errors::analysis_error::AnalysisError as AErr;
    use trajectory_core::traits::Analyzer;
    use trajectory_core::types::task::ProgressSnapshot;

    struct ImmediateOkAnalyzer;
    impl Analyzer for ImmediateOkAnalyzer {
        fn name(&self) -> &str {
            "immediate_ok"
        }
        fn execute(
            &self,
            _task_id: TaskId,
            _mode: AnalyzerMode,
            _cancel: &CancellationToken,
        ) -> Result<(), AErr> {
            Ok(())
        }
        fn progress(&self, _task_id: TaskId) -> Option<ProgressSnapshot> {
            None
        }
    }

    fn dispatcher() -> Dispatcher {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let mut registry = AnalyzerRegistry::new();
        registry
            .register("immediate_ok", Box::new(|_s| Box::new(ImmediateOkAnalyzer)))
            .unwrap();
        Dispatcher::new(registry, storage)
    }

    #[test]
    fn create_task_runs_to_completion() {
        let dispatcher = dispatcher();
        let task = dispatcher
            .create_task("immediate_ok", TaskType::Incremental, serde_json::json!({}))
            .unwrap();
        assert_eq!(task.status, trajectory_core::types::task::TaskStatus::Completed);
    }

    #[test]
    fn unregistered_analyzer_rejected() {
        let dispatcher = dispatcher();
        let err = dispatcher
            .create_task("nope", TaskType::Incremental, serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, AErr::AnalyzerNotFound { .. }));
    }
}
