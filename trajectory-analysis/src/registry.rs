//! Task registry (spec.md §4.1): a process-wide name→factory table.
//!
//! Grounded on `DetectorRegistry`'s register/enumerate shape, but keyed
//! by name→factory rather than holding constructed instances directly —
//! each analyzer needs a live storage handle per task, so the registry
//! hands out instances lazily rather than up front.

use std::sync::Arc;

use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::traits::Analyzer;
use trajectory_core::FxHashMap;
use trajectory_storage::TrajectoryStorageEngine;

/// Builds an analyzer instance bound to a storage handle.
pub type AnalyzerFactory = Box<dyn Fn(Arc<TrajectoryStorageEngine>) -> Box<dyn Analyzer> + Send + Sync>;

/// Process-wide mapping from analyzer name to its factory. Registration
/// happens once at process start via [`register_all`]; lookup is a
/// side-effect-free read (spec.md §4.1).
#[derive(Default)]
pub struct AnalyzerRegistry {
    factories: FxHashMap<String, AnalyzerFactory>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// Register `factory` under `name`. Rejects a duplicate name rather
    /// than silently overwriting it (spec.md §4.1: "no analyzer may be
    /// registered twice under the same name; later registrations are
    /// rejected").
    pub fn register(&mut self, name: &str, factory: AnalyzerFactory) -> Result<(), AnalysisError> {
        if self.factories.contains_key(name) {
            return Err(AnalysisError::AlreadyRegistered {
                name: name.to_string(),
            });
        }
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    /// Build an analyzer instance for `name`, bound to `storage`.
    pub fn lookup(
        &self,
        name: &str,
        storage: Arc<TrajectoryStorageEngine>,
    ) -> Result<Box<dyn Analyzer>, AnalysisError> {
        self.factories
            .get(name)
            .map(|factory| factory(storage))
            .ok_or_else(|| AnalysisError::AnalyzerNotFound {
                name: name.to_string(),
            })
    }

    /// All registered analyzer names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trajectory_core::cancellation::CancellationToken;
    use trajectory_core::types::identifiers::TaskId;
    use trajectory_core::types::task::{AnalyzerMode, ProgressSnapshot};

    struct StubAnalyzer;
    impl Analyzer for StubAnalyzer {
        fn name(&self) -> &str {
            "stub"
        }
        fn execute(
            &self,
            _task_id: TaskId,
            _mode: AnalyzerMode,
            _cancel: &CancellationToken,
        ) -> Result<(), AnalysisError> {
            Ok(())
        }
        fn progress(&self, _task_id: TaskId) -> Option<ProgressSnapshot> {
            None
        }
    }

    fn storage() -> Arc<TrajectoryStorageEngine> {
        Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap())
    }

    #[test]
    fn registers_and_looks_up() {
        let mut registry = AnalyzerRegistry::new();
        registry
            .register("stub", Box::new(|_storage| Box::new(StubAnalyzer)))
            .unwrap();
        assert!(registry.is_registered("stub"));
        let analyzer = registry.lookup("stub", storage()).unwrap();
        assert_eq!(analyzer.name(), "stub");
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry = AnalyzerRegistry::new();
        registry
            .register("stub", Box::new(|_storage| Box::new(StubAnalyzer)))
            .unwrap();
        let err = registry
            .register("stub", Box::new(|_storage| Box::new(StubAnalyzer)))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::AlreadyRegistered { .. }));
    }

    #[test]
    fn unknown_name_errors() {
        let registry = AnalyzerRegistry::new();
        let err = registry.lookup("nope", storage()).unwrap_err();
        assert!(matches!(err, AnalysisError::AnalyzerNotFound { .. }));
    }
}
