//! Outlier detection — point-stream state machine (spec.md §4.5.1).
//!
//! Rules are applied independently; any hit sets the outlier flag and
//! appends its code. Two rule families (`BACKTRACK`, `STATIC_DRIFT`) are
//! known to be false-positive-prone and stay disabled per spec.md — this
//! implementation never emits those codes.

use std::sync::Arc;

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::config::OutlierConfig;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::numerics::haversine::haversine_distance_m;
use trajectory_core::traits::Analyzer;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::task::{AnalyzerMode, ProgressSnapshot};
use trajectory_core::types::track_point::{QaStatus, TrackPoint};
use trajectory_storage::batch::{BatchCommand, QaUpdateRow};
use trajectory_storage::TrajectoryStorageEngine;

use crate::engine::AnalyzerBase;
use crate::lifecycle::TaskLifecycleManager;

pub const NAME: &str = "outlier_detection";

pub struct OutlierAnalyzer {
    base: AnalyzerBase,
    lifecycle: Arc<TaskLifecycleManager>,
    config: OutlierConfig,
}

impl OutlierAnalyzer {
    pub fn new(
        storage: Arc<TrajectoryStorageEngine>,
        lifecycle: Arc<TaskLifecycleManager>,
        config: OutlierConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            base: AnalyzerBase::new(storage, lifecycle.clone(), batch_size),
            lifecycle,
            config,
        }
    }

    /// Classify one point against the previous point in timestamp
    /// order. Returns `None` if the point fires no rule (still
    /// `PASS`/`WARNING`, no update needed).
    fn classify(&self, prev: Option<&TrackPoint>, point: &TrackPoint) -> QaUpdateRow {
        let mut reason_codes: Vec<String> = Vec::new();

        if let Some(speed) = point.speed {
            if speed > self.config.effective_max_plausible_speed_mps() {
                reason_codes.push("EXCESSIVE_SPEED".to_string());
            }
        }

        let accuracy = point.accuracy;
        if let Some(acc) = accuracy {
            if acc > self.config.effective_max_accuracy_radius_m() {
                reason_codes.push("LOW_ACCURACY".to_string());
            }
        }

        if let Some(prev) = prev {
            let dt = (point.ts - prev.ts) as f64;
            if dt > 0.0 && dt <= self.config.effective_jump_window_s() {
                let dist = haversine_distance_m(prev.lat, prev.lon, point.lat, point.lon);
                if dist >= self.config.effective_jump_distance_m() {
                    reason_codes.push("JUMP".to_string());
                }
            }
        }

        let qa_status = if !reason_codes.is_empty() {
            QaStatus::Fail
        } else if accuracy.map(|a| (50.0..=100.0).contains(&a)).unwrap_or(false) {
            QaStatus::Warning
        } else {
            QaStatus::Pass
        };

        QaUpdateRow {
            point_id: point.id,
            outlier_flag: !reason_codes.is_empty(),
            outlier_reason_codes: reason_codes,
            qa_status: qa_status.as_str().to_string(),
        }
    }

    /// Full mode clears the three output columns before processing
    /// (spec.md §4.5.1), in a single transaction.
    fn clear_previous_results(&self, storage: &TrajectoryStorageEngine) -> Result<(), AnalysisError> {
        storage.database().with_writer::<(), AnalysisError>(|conn| {
            conn.execute(
                "UPDATE track_points SET outlier_flag = 0, outlier_reason_codes = '[]', qa_status = 'PASS'",
                [],
            )
            .map_err(|e| {
                trajectory_core::errors::storage_error::StorageError::SqliteError {
                    message: e.to_string(),
                }
                .into()
            })?;
            Ok(())
        })
    }
}

impl Analyzer for OutlierAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn execute(
        &self,
        task_id: TaskId,
        mode: AnalyzerMode,
        cancel: &CancellationToken,
    ) -> Result<(), AnalysisError> {
        if mode == AnalyzerMode::Full {
            self.clear_previous_results(self.base.storage())?;
        }

        let mut prev: Option<TrackPoint> = None;
        let mut flagged_count: i64 = 0;

        let stats = self.base.run_over_points(task_id, cancel, 0, |batch| {
            let mut updates = Vec::with_capacity(batch.len());
            for point in batch {
                let update = self.classify(prev.as_ref(), point);
                if update.outlier_flag {
                    flagged_count += 1;
                }
                updates.push(update);
                prev = Some(point.clone());
            }
            self.base
                .storage()
                .send_batch(BatchCommand::UpdateTrackPointQa(updates))?;
            Ok(0)
        })?;

        self.lifecycle.complete(
            task_id,
            serde_json::json!({
                "points_scanned": stats.processed,
                "points_flagged": flagged_count,
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
    use trajectory_core::types::track_point::AdminLabels;

    fn point(id: i64, ts: i64, lat: f64, lon: f64, speed: Option<f64>, accuracy: Option<f64>) -> TrackPoint {
        TrackPoint {
            id,
            ts,
            lat,
            lon,
            altitude: None,
            speed,
            heading: None,
            accuracy,
            admin: AdminLabels::default(),
            grid_id: None,
            outlier_flag: false,
            outlier_reason_codes: Vec::new(),
            qa_status: QaStatus::Pass,
        }
    }

    fn analyzer() -> OutlierAnalyzer {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        OutlierAnalyzer::new(storage, lifecycle, OutlierConfig::default(), 500)
    }

    #[test]
    fn excessive_speed_flags_s2() {
        let a = analyzer();
        let p = point(1, 0, 39.9, 116.4, Some(300.0), Some(5.0));
        let row = a.classify(None, &p);
        assert!(row.outlier_flag);
        assert!(row.outlier_reason_codes.contains(&"EXCESSIVE_SPEED".to_string()));
        assert_eq!(row.qa_status, "FAIL");
    }

    #[test]
    fn jump_flags_second_point_s3() {
        let a = analyzer();
        let p1 = point(1, 0, 0.0, 0.0, Some(1.0), Some(5.0));
        // ~2km away, 1 second later.
        let p2 = point(2, 1, 0.018, 0.0, Some(1.0), Some(5.0));
        let row = a.classify(Some(&p1), &p2);
        assert!(row.outlier_reason_codes.contains(&"JUMP".to_string()));
    }

    #[test]
    fn low_accuracy_warning_without_other_codes() {
        let a = analyzer();
        let p = point(1, 0, 10.0, 10.0, Some(1.0), Some(75.0));
        let row = a.classify(None, &p);
        assert!(!row.outlier_flag);
        assert_eq!(row.qa_status, "WARNING");
    }

    #[test]
    fn clean_point_passes() {
        let a = analyzer();
        let p = point(1, 0, 10.0, 10.0, Some(1.0), Some(5.0));
        let row = a.classify(None, &p);
        assert!(!row.outlier_flag);
        assert_eq!(row.qa_status, "PASS");
    }
}
