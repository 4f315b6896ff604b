//! Stay statistics: total dwell time per city, rolled up at
//! all/year/month/day granularity. Reads every stay in one pass rather
//! than paging through `track_points`, mirroring
//! [`crate::analyzers::revisit_pattern`].

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
use crate::lifecycle::TaskLifecycleManager;

pub const NAME: &str = "stay_statistics";

pub struct StayStatisticsAnalyzer {
    storage: Arc<TrajectoryStorageEngine>,
    lifecycle: Arc<TaskLifecycleManager>,
}

impl StayStatisticsAnalyzer {
    pub fn new(storage: Arc<TrajectoryStorageEngine>, lifecycle: Arc<TaskLifecycleManager>) -> Self {
        Self { storage, lifecycle }
    }

    fn clear(&self) -> Result<(), AnalysisError> {
        self.storage.database().with_writer::<(), AnalysisError>(|conn| {
            queries::bucketed_statistics::delete_metric(conn, NAME).map_err(AnalysisError::from)
        })
    }
}

impl Analyzer for StayStatisticsAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn execute(&self, task_id: TaskId, _mode: AnalyzerMode, cancel: &CancellationToken) -> Result<(), AnalysisError> {
        self.clear()?;

        let stays = self
            .storage
            .database()
            .with_reader::<_, AnalysisError>(|conn| {
                queries::stays::stays_in_range(conn, i64::MIN, i64::MAX).map_err(AnalysisError::from)
            })?;

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let mut agg = BucketAggregator::new(NAME);
        for stay in &stays {
            let Some(city) = stay.admin.city.as_deref() else { continue };
            let day = calendar::day_bucket(stay.start_ts);
            let keys = agg.keys_for(stay.start_ts, AreaType::City, city, None);
            agg.record(keys, stay.duration_s as f64, Some(&day));
        }

        let rows = agg.into_rows();
        let row_count = rows.len();
        if !rows.is_empty() {
            self.storage.send_batch(BatchCommand::UpsertBucketedStatistics(rows))?;
        }
        self.storage.flush_batch_sync()?;
        self.lifecycle.report_progress(task_id, stays.len() as i64, 0)?;

        self.lifecycle.complete(
            task_id,
            serde_json::json!({
                "stays_considered": stays.len(),
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
    use trajectory_core::types::track_point::AdminLabels;
    use trajectory_storage::batch::BatchCommand as Cmd;
    use trajectory_core::types::stay::StaySegment;

    fn stay(start_ts: i64, duration_s: i64, city: Option<&str>) -> StaySegment {
        StaySegment {
            id: 0,
            start_ts,
            end_ts: start_ts + duration_s,
            duration_s,
            center_lat: 1.0,
            center_lon: 1.0,
            geohash6: "abcdef".to_string(),
            admin: AdminLabels {
                city: city.map(str::to_string),
                ..AdminLabels::default()
            },
            stay_type: None,
            reason_codes: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn sums_duration_per_city() {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        storage
            .send_batch(Cmd::InsertStaySegments(vec![
                stay(1_623_715_200, 600, Some("beijing")),
                stay(1_623_715_900, 900, Some("beijing")),
            ]))
            .unwrap();
        storage.flush_batch_sync().unwrap();

        let analyzer = StayStatisticsAnalyzer::new(storage.clone(), lifecycle.clone());
        let task = lifecycle.create(NAME, TaskType::FullRecompute, serde_json::json!({})).unwrap();
        lifecycle.start(task.id).unwrap();
        analyzer.execute(task.id, AnalyzerMode::Full, &CancellationToken::new()).unwrap();

        let rows = storage
            .database()
            .with_reader(|conn| queries::bucketed_statistics::statistics_for_area(conn, NAME, AreaType::City, "beijing"))
            .unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().any(|r| r.sum == 1500.0));
    }
}
