//! The `Analyzer` contract (spec.md §4.2): every in-process analyzer in
//! `trajectory-analysis` implements this trait and is registered under a
//! unique name in the `AnalyzerRegistry`.

use crate::cancellation::CancellationToken;
use crate::errors::analysis_error::AnalysisError;
use crate::types::identifiers::TaskId;
use crate::types::task::{AnalyzerMode, ProgressSnapshot};

/// A unit of analysis work over ingested track points. Implementations
/// are expected to be stateless (or internally synchronized) since the
/// registry hands out `Arc<dyn Analyzer>` to multiple callers.
pub trait Analyzer: Send + Sync {
    /// Stable, unique name this analyzer is registered under. Used as
    /// the `analyzer_name` column on `AnalysisTask` rows.
    fn name(&self) -> &str;

    /// Run the analyzer for `task_id` in the given `mode`. Implementations
    /// poll `cancel` between batches and return `Err(AnalysisError::Cancelled)`
    /// promptly once it trips (spec.md §5, "cooperative, not preemptive").
    fn execute(
        &self,
        task_id: TaskId,
        mode: AnalyzerMode,
        cancel: &CancellationToken,
    ) -> Result<(), AnalysisError>;

    /// Point-in-time progress for a task this analyzer is (or was)
    /// running. Returns `None` if the task is unknown to this analyzer.
    fn progress(&self, task_id: TaskId) -> Option<ProgressSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubAnalyzer {
        ran: AtomicBool,
    }

    impl Analyzer for StubAnalyzer {
        fn name(&self) -> &str {
            "stub"
        }

        fn execute(
            &self,
            _task_id: TaskId,
            _mode: AnalyzerMode,
            cancel: &CancellationToken,
        ) -> Result<(), AnalysisError> {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
            self.ran.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn progress(&self, _task_id: TaskId) -> Option<ProgressSnapshot> {
            None
        }
    }

    #[test]
    fn object_safe_and_callable() {
        let analyzer: Box<dyn Analyzer> = Box::new(StubAnalyzer {
            ran: AtomicBool::new(false),
        });
        let token = CancellationToken::new();
        assert!(analyzer
            .execute(TaskId(1), AnalyzerMode::Incremental, &token)
            .is_ok());
    }

    #[test]
    fn respects_cancellation() {
        let analyzer = StubAnalyzer {
            ran: AtomicBool::new(false),
        };
        let token = CancellationToken::new();
        token.cancel();
        let result = analyzer.execute(TaskId(1), AnalyzerMode::Incremental, &token);
        assert!(matches!(result, Err(AnalysisError::Cancelled)));
    }
}
