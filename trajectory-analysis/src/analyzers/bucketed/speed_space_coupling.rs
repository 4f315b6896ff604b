//! Speed/space coupling: observed speed bucketed by grid cell and
//! transport mode, so a reader can ask "how fast does traffic move
//! through this cell, by mode" at any time granularity.

use std::sync::Arc;

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::numerics::geohash;
use trajectory_core::traits::Analyzer;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::segment::TransportMode;
use trajectory_core::types::task::{AnalyzerMode, ProgressSnapshot};
use trajectory_core::types::AreaType;
use trajectory_storage::batch::BatchCommand;
use trajectory_storage::{queries, TrajectoryStorageEngine};

use crate::analyzers::bucketed::aggregator::BucketAggregator;
use crate::calendar;
use crate::engine::AnalyzerBase;
use crate::lifecycle::TaskLifecycleManager;

pub const NAME: &str = "speed_space_coupling";

/// Precision used when a point has no assigned `grid_id` yet (matches
/// the stay-construction cell size).
const FALLBACK_GRID_PRECISION: usize = 6;

pub struct SpeedSpaceCouplingAnalyzer {
    base: AnalyzerBase,
    lifecycle: Arc<TaskLifecycleManager>,
}

impl SpeedSpaceCouplingAnalyzer {
    pub fn new(storage: Arc<TrajectoryStorageEngine>, lifecycle: Arc<TaskLifecycleManager>, batch_size: usize) -> Self {
        Self {
            base: AnalyzerBase::new(storage, lifecycle.clone(), batch_size),
            lifecycle,
        }
    }

    fn clear(&self) -> Result<(), AnalysisError> {
        self.base.storage().database().with_writer::<(), AnalysisError>(|conn| {
            queries::bucketed_statistics::delete_metric(conn, NAME).map_err(AnalysisError::from)
        })
    }
}

impl Analyzer for SpeedSpaceCouplingAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn execute(&self, task_id: TaskId, _mode: AnalyzerMode, cancel: &CancellationToken) -> Result<(), AnalysisError> {
        self.clear()?;

        let mut agg = BucketAggregator::new(NAME);
        let stats = self.base.run_over_points(task_id, cancel, 0, |batch| {
            for point in batch {
                if point.outlier_flag {
                    continue;
                }
                let Some(speed) = point.speed else { continue };
                let grid_key = point
                    .grid_id
                    .clone()
                    .unwrap_or_else(|| geohash::encode(point.lat, point.lon, FALLBACK_GRID_PRECISION));
                let mode = TransportMode::classify(speed);
                let day = calendar::day_bucket(point.ts);
                let keys = agg.keys_for(point.ts, AreaType::Grid, &grid_key, Some(mode.as_str()));
                agg.record(keys, speed, Some(&day));
            }
            Ok(0)
        })?;

        let rows = agg.into_rows();
        let row_count = rows.len();
        if !rows.is_empty() {
            self.base.storage().send_batch(BatchCommand::UpsertBucketedStatistics(rows))?;
        }
        self.base.storage().flush_batch_sync()?;

        self.lifecycle.complete(
            task_id,
            serde_json::json!({
                "points_scanned": stats.processed,
                "buckets_emitted": row_count,
            }),
        )?;
        Ok(())
    }

    fn progress(&self, task_id: TaskId) -> Option<ProgressSnapshot> {
        let task = self.lifecycle.get(task_id).ok()?;
        Some(ProgressSnapshot::compute(
            task.processed_points,
            task.total_points,
            task.failed_points,
            0.0,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trajectory_core::types::task::TaskType;
    use trajectory_core::types::track_point::{AdminLabels, QaStatus, TrackPoint};

    fn point(id: i64, ts: i64, speed: Option<f64>, grid_id: Option<&str>) -> TrackPoint {
        TrackPoint {
            id,
            ts,
            lat: 39.9,
            lon: 116.4,
            altitude: None,
            speed,
            heading: None,
            accuracy: Some(5.0),
            admin: AdminLabels::default(),
            grid_id: grid_id.map(str::to_string),
            outlier_flag: false,
            outlier_reason_codes: Vec::new(),
            qa_status: QaStatus::Pass,
        }
    }

    fn harness() -> (Arc<TrajectoryStorageEngine>, Arc<TaskLifecycleManager>) {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        (storage, lifecycle)
    }

    #[test]
    fn points_without_speed_are_skipped() {
        let (storage, lifecycle) = harness();
        storage
            .send_batch(BatchCommand::InsertTrackPoints(vec![point(1, 0, None, Some("cell1"))]))
            .unwrap();
        storage.flush_batch_sync().unwrap();

        let analyzer = SpeedSpaceCouplingAnalyzer::new(storage.clone(), lifecycle.clone(), 100);
        let task = lifecycle.create(NAME, TaskType::FullRecompute, serde_json::json!({})).unwrap();
        lifecycle.start(task.id).unwrap();
        analyzer.execute(task.id, AnalyzerMode::Full, &CancellationToken::new()).unwrap();

        let rows = storage
            .database()
            .with_reader(|conn| queries::bucketed_statistics::statistics_for_area(conn, NAME, AreaType::Grid, "cell1"))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn missing_grid_id_falls_back_to_geohash() {
        let (storage, lifecycle) = harness();
        storage
            .send_batch(BatchCommand::InsertTrackPoints(vec![point(1, 1_623_715_200, Some(20.0), None)]))
            .unwrap();
        storage.flush_batch_sync().unwrap();

        let analyzer = SpeedSpaceCouplingAnalyzer::new(storage.clone(), lifecycle.clone(), 100);
        let task = lifecycle.create(NAME, TaskType::FullRecompute, serde_json::json!({})).unwrap();
        lifecycle.start(task.id).unwrap();
        analyzer.execute(task.id, AnalyzerMode::Full, &CancellationToken::new()).unwrap();

        let cell = geohash::encode(39.9, 116.4, FALLBACK_GRID_PRECISION);
        let rows = storage
            .database()
            .with_reader(|conn| queries::bucketed_statistics::statistics_for_area(conn, NAME, AreaType::Grid, &cell))
            .unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().any(|r| r.sum == 20.0));
    }
}
