//! Analysis engine: the pluggable analyzer registry, task lifecycle,
//! dependency cascade, and the concrete analyzers that turn raw
//! `track_points` into segments, stays, trips, speed events, and the
//! bucketed-statistics family.

pub mod analyzers;
pub mod calendar;
pub mod cascade;
pub mod dispatcher;
pub mod engine;
pub mod lifecycle;
pub mod registry;
pub mod worker;

use std::sync::Arc;

use trajectory_core::config::EngineConfig;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_storage::TrajectoryStorageEngine;

use crate::lifecycle::TaskLifecycleManager;
use crate::registry::AnalyzerRegistry;

/// Registers every in-process analyzer, plus the `stay_detection`
/// contract against the external-worker adapter, under the registry
/// (spec.md §4.1). Each factory captures its own cloned slice of
/// `config` rather than the whole struct, so a tuning change to one
/// analyzer's thresholds can't accidentally affect another's.
pub fn register_all(registry: &mut AnalyzerRegistry, config: &EngineConfig) -> Result<(), AnalysisError> {
    let batch_size = config.batching.effective_max_batch_rows();

    {
        let config = config.outliers.clone();
        registry.register(
            analyzers::outlier::NAME,
            Box::new(move |storage| {
                let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
                Box::new(analyzers::outlier::OutlierAnalyzer::new(storage, lifecycle, config.clone(), batch_size))
            }),
        )?;
    }

    registry.register(
        analyzers::transport_mode::NAME,
        Box::new(move |storage| {
            let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
            Box::new(analyzers::transport_mode::TransportModeAnalyzer::new(storage, lifecycle, batch_size))
        }),
    )?;

    {
        let worker_config = config.external_worker.clone();
        registry.register(
            analyzers::stay_construction::NAME,
            Box::new(move |storage| {
                let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
                Box::new(worker::ExternalWorkerAnalyzer::new(
                    analyzers::stay_construction::NAME,
                    worker_config.clone(),
                    storage,
                    lifecycle,
                ))
            }),
        )?;
    }

    {
        let config = config.speed_events.clone();
        registry.register(
            analyzers::speed_events::NAME,
            Box::new(move |storage| {
                let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
                Box::new(analyzers::speed_events::SpeedEventAnalyzer::new(storage, lifecycle, config.clone()))
            }),
        )?;
    }

    {
        let config = config.trips.clone();
        let significant_dwell_s = config.effective_significant_dwell_s() as i64;
        registry.register(
            analyzers::trip_construction::NAME,
            Box::new(move |storage| {
                let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
                Box::new(analyzers::trip_construction::TripConstructionAnalyzer::new(
                    storage,
                    lifecycle,
                    config.clone(),
                    significant_dwell_s,
                ))
            }),
        )?;
    }

    registry.register(
        analyzers::revisit_pattern::NAME,
        Box::new(move |storage| {
            let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
            Box::new(analyzers::revisit_pattern::RevisitPatternAnalyzer::new(storage, lifecycle))
        }),
    )?;

    registry.register(
        analyzers::bucketed::footprint_statistics::NAME,
        Box::new(move |storage| {
            let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
            Box::new(analyzers::bucketed::footprint_statistics::FootprintStatisticsAnalyzer::new(
                storage, lifecycle, batch_size,
            ))
        }),
    )?;

    registry.register(
        analyzers::bucketed::stay_statistics::NAME,
        Box::new(move |storage| {
            let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
            Box::new(analyzers::bucketed::stay_statistics::StayStatisticsAnalyzer::new(storage, lifecycle))
        }),
    )?;

    registry.register(
        analyzers::bucketed::admin_view_engine::NAME,
        Box::new(move |storage| {
            let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
            Box::new(analyzers::bucketed::admin_view_engine::AdminViewEngineAnalyzer::new(
                storage, lifecycle, batch_size,
            ))
        }),
    )?;

    registry.register(
        analyzers::bucketed::speed_space_coupling::NAME,
        Box::new(move |storage| {
            let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
            Box::new(analyzers::bucketed::speed_space_coupling::SpeedSpaceCouplingAnalyzer::new(
                storage, lifecycle, batch_size,
            ))
        }),
    )?;

    registry.register(
        analyzers::bucketed::directional_bias::NAME,
        Box::new(move |storage| {
            let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
            Box::new(analyzers::bucketed::directional_bias::DirectionalBiasAnalyzer::new(
                storage, lifecycle, batch_size,
            ))
        }),
    )?;

    Ok(())
}

/// Convenience constructor: a [`dispatcher::Dispatcher`] with every
/// analyzer in [`register_all`] already wired in.
pub fn build_dispatcher(
    storage: Arc<TrajectoryStorageEngine>,
    config: &EngineConfig,
) -> Result<dispatcher::Dispatcher, AnalysisError> {
    let mut registry = AnalyzerRegistry::new();
    register_all(&mut registry, config)?;
    Ok(dispatcher::Dispatcher::new(registry, storage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_analyzer_exactly_once() {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let dispatcher = build_dispatcher(storage, &EngineConfig::default()).unwrap();
        let names = dispatcher.registered_analyzers();
        assert_eq!(names.len(), 11);
        for expected in [
            "outlier_detection",
            "transport_mode",
            "stay_detection",
            "speed_events",
            "trip_construction",
            "revisit_pattern",
            "footprint_statistics",
            "stay_statistics",
            "admin_view_engine",
            "speed_space_coupling",
            "directional_bias",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }
}
