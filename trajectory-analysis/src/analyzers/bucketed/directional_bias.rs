//! Directional bias: per grid cell, the circular mean and spread of
//! observed headings. Headings wrap at 360°, so they can't be folded
//! into [`super::aggregator::BucketAggregator`]'s linear sum/min/max
//! shape — this accumulates running sin/cos sums per cell instead,
//! the same construction as
//! [`trajectory_core::numerics::circular`] but over a running total
//! rather than a materialized slice, so memory stays bounded by the
//! number of distinct cells rather than the number of points.
//!
//! Reports one row per cell at `BucketType::All` only; there is no
//! year/month/day breakdown for this analyzer.

use std::collections::HashMap;
use std::sync::Arc;

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::numerics::geohash;
use trajectory_core::traits::Analyzer;
use trajectory_core::types::{AreaType, BucketKey, BucketType, BucketedStatistic};
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::task::{AnalyzerMode, ProgressSnapshot};
use trajectory_storage::batch::BatchCommand;
use trajectory_storage::{queries, TrajectoryStorageEngine};

use crate::engine::AnalyzerBase;
use crate::lifecycle::TaskLifecycleManager;

pub const NAME: &str = "directional_bias";

const FALLBACK_GRID_PRECISION: usize = 6;

const MAX_TRACKED_CELLS: usize = 200_000;

#[derive(Default)]
struct HeadingAccumulator {
    sin_sum: f64,
    cos_sum: f64,
    count: u64,
}

impl HeadingAccumulator {
    fn add(&mut self, heading_deg: f64) {
        let rad = heading_deg.to_radians();
        self.sin_sum += rad.sin();
        self.cos_sum += rad.cos();
        self.count += 1;
    }

    /// Circular mean/stddev in degrees from the running sums, matching
    /// the math in [`trajectory_core::numerics::circular`].
    fn finalize(&self) -> (f64, f64) {
        let n = self.count as f64;
        let mean_rad = self.sin_sum.atan2(self.cos_sum);
        let mean_deg = mean_rad.to_degrees();
        let mean_deg = if mean_deg < 0.0 { mean_deg + 360.0 } else { mean_deg };

        let r = ((self.sin_sum / n).powi(2) + (self.cos_sum / n).powi(2)).sqrt();
        let stddev_deg = (-2.0 * r.ln()).max(0.0).sqrt().to_degrees();

        (mean_deg, stddev_deg)
    }
}

pub struct DirectionalBiasAnalyzer {
    base: AnalyzerBase,
    lifecycle: Arc<TaskLifecycleManager>,
}

impl DirectionalBiasAnalyzer {
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

impl Analyzer for DirectionalBiasAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn execute(&self, task_id: TaskId, _mode: AnalyzerMode, cancel: &CancellationToken) -> Result<(), AnalysisError> {
        self.clear()?;

        let mut by_cell: HashMap<String, HeadingAccumulator> = HashMap::new();
        let mut capped = false;

        let stats = self.base.run_over_points(task_id, cancel, 0, |batch| {
            for point in batch {
                if point.outlier_flag {
                    continue;
                }
                let Some(heading) = point.heading else { continue };
                let grid_key = point
                    .grid_id
                    .clone()
                    .unwrap_or_else(|| geohash::encode(point.lat, point.lon, FALLBACK_GRID_PRECISION));

                if !by_cell.contains_key(&grid_key) && by_cell.len() >= MAX_TRACKED_CELLS {
                    if !capped {
                        tracing::warn!(cap = MAX_TRACKED_CELLS, "directional bias cell map capped; dropping overflow cells");
                        capped = true;
                    }
                    continue;
                }
                by_cell.entry(grid_key).or_default().add(heading);
            }
            Ok(0)
        })?;

        let mut rows = Vec::with_capacity(by_cell.len());
        for (grid_key, acc) in &by_cell {
            let (mean_deg, stddev_deg) = acc.finalize();
            let key = BucketKey {
                metric: NAME.to_string(),
                bucket_type: BucketType::All,
                bucket_key: "all".to_string(),
                area_type: AreaType::Grid,
                area_key: grid_key.clone(),
                mode_filter: None,
            };
            let stat = BucketedStatistic {
                count: acc.count as i64,
                sum: mean_deg,
                max: stddev_deg,
                min: 0.0,
                visit_days: Vec::new(),
            };
            rows.push((key, stat));
        }

        let row_count = rows.len();
        if !rows.is_empty() {
            self.base.storage().send_batch(BatchCommand::UpsertBucketedStatistics(rows))?;
        }
        self.base.storage().flush_batch_sync()?;

        self.lifecycle.complete(
            task_id,
            serde_json::json!({
                "points_scanned": stats.processed,
                "cells_emitted": row_count,
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

    fn point(id: i64, ts: i64, heading: Option<f64>) -> TrackPoint {
        TrackPoint {
            id,
            ts,
            lat: 39.9,
            lon: 116.4,
            altitude: None,
            speed: Some(10.0),
            heading,
            accuracy: Some(5.0),
            admin: AdminLabels::default(),
            grid_id: Some("cell1".to_string()),
            outlier_flag: false,
            outlier_reason_codes: Vec::new(),
            qa_status: QaStatus::Pass,
        }
    }

    #[test]
    fn consistent_heading_has_low_spread() {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        storage
            .send_batch(BatchCommand::InsertTrackPoints(vec![
                point(1, 0, Some(90.0)),
                point(2, 10, Some(91.0)),
                point(3, 20, Some(89.0)),
            ]))
            .unwrap();
        storage.flush_batch_sync().unwrap();

        let analyzer = DirectionalBiasAnalyzer::new(storage.clone(), lifecycle.clone(), 100);
        let task = lifecycle.create(NAME, TaskType::FullRecompute, serde_json::json!({})).unwrap();
        lifecycle.start(task.id).unwrap();
        analyzer.execute(task.id, AnalyzerMode::Full, &CancellationToken::new()).unwrap();

        let rows = storage
            .database()
            .with_reader(|conn| queries::bucketed_statistics::statistics_for_area(conn, NAME, AreaType::Grid, "cell1"))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].sum - 90.0).abs() < 2.0);
        assert!(rows[0].max < 5.0, "stddev was {}", rows[0].max);
    }

    #[test]
    fn points_without_heading_are_skipped() {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        storage
            .send_batch(BatchCommand::InsertTrackPoints(vec![point(1, 0, None)]))
            .unwrap();
        storage.flush_batch_sync().unwrap();

        let analyzer = DirectionalBiasAnalyzer::new(storage.clone(), lifecycle.clone(), 100);
        let task = lifecycle.create(NAME, TaskType::FullRecompute, serde_json::json!({})).unwrap();
        lifecycle.start(task.id).unwrap();
        analyzer.execute(task.id, AnalyzerMode::Full, &CancellationToken::new()).unwrap();

        let rows = storage
            .database()
            .with_reader(|conn| queries::bucketed_statistics::statistics_for_area(conn, NAME, AreaType::Grid, "cell1"))
            .unwrap();
        assert!(rows.is_empty());
    }
}
