//! Admin-view rollups: the same point contributes to every
//! administrative granularity it has a label for (province, city,
//! county, town) simultaneously, each under its own `AreaType`.

use std::sync::Arc;

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::traits::Analyzer;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::task::{AnalyzerMode, ProgressSnapshot};
use trajectory_core::types::AreaType;
use trajectory_storage::batch::BatchCommand;
use trajectory_storage::{queries, TrajectoryStorageEngine};

use crate::analyzers::bucketed::aggregator::BucketAggregator;
use crate::calendar;
use crate::engine::AnalyzerBase;
use crate::lifecycle::TaskLifecycleManager;

pub const NAME: &str = "admin_view_engine";

pub struct AdminViewEngineAnalyzer {
    base: AnalyzerBase,
    lifecycle: Arc<TaskLifecycleManager>,
}

impl AdminViewEngineAnalyzer {
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

impl Analyzer for AdminViewEngineAnalyzer {
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
                let day = calendar::day_bucket(point.ts);
                let levels: [(AreaType, &Option<String>); 4] = [
                    (AreaType::Province, &point.admin.province),
                    (AreaType::City, &point.admin.city),
                    (AreaType::County, &point.admin.county),
                    (AreaType::Town, &point.admin.town),
                ];
                for (area_type, label) in levels {
                    let Some(label) = label.as_deref() else { continue };
                    let keys = agg.keys_for(point.ts, area_type, label, None);
                    agg.record(keys, 1.0, Some(&day));
                }
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

    fn point(id: i64, ts: i64) -> TrackPoint {
        TrackPoint {
            id,
            ts,
            lat: 39.9,
            lon: 116.4,
            altitude: None,
            speed: Some(1.0),
            heading: None,
            accuracy: Some(5.0),
            admin: AdminLabels {
                province: Some("beijing_province".to_string()),
                city: Some("beijing".to_string()),
                county: None,
                town: None,
            },
            grid_id: None,
            outlier_flag: false,
            outlier_reason_codes: Vec::new(),
            qa_status: QaStatus::Pass,
        }
    }

    #[test]
    fn one_point_contributes_to_every_populated_level() {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        storage
            .send_batch(BatchCommand::InsertTrackPoints(vec![point(1, 1_623_715_200)]))
            .unwrap();
        storage.flush_batch_sync().unwrap();

        let analyzer = AdminViewEngineAnalyzer::new(storage.clone(), lifecycle.clone(), 100);
        let task = lifecycle.create(NAME, TaskType::FullRecompute, serde_json::json!({})).unwrap();
        lifecycle.start(task.id).unwrap();
        analyzer.execute(task.id, AnalyzerMode::Full, &CancellationToken::new()).unwrap();

        let province_rows = storage
            .database()
            .with_reader(|conn| queries::bucketed_statistics::statistics_for_area(conn, NAME, AreaType::Province, "beijing_province"))
            .unwrap();
        let city_rows = storage
            .database()
            .with_reader(|conn| queries::bucketed_statistics::statistics_for_area(conn, NAME, AreaType::City, "beijing"))
            .unwrap();
        assert_eq!(province_rows.len(), 4);
        assert_eq!(city_rows.len(), 4);
    }
}
