//! Transport-mode segmentation: streaming partition of non-outlier
//! points by instantaneous speed band into `Segment` rows.
//!
//! A run of consecutive same-mode points shares its boundary with its
//! neighbors: the point that triggers a mode transition extends the
//! closing run's `end_ts` forward to that point, and the newly opened
//! run's `start_ts` reaches back to the closing run's own last point.
//! This keeps a single-point run (a mode that only ever shows up for
//! one sample, e.g. trailing at the very end of a stream) from being
//! silently dropped by the minimum-duration filter below — its
//! reported span still covers real elapsed time even though it owns
//! only one point.

use std::sync::Arc;

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::numerics::haversine::polyline_distance_m;
use trajectory_core::traits::Analyzer;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::segment::{Segment, TransportMode};
use trajectory_core::types::task::{AnalyzerMode, ProgressSnapshot};
use trajectory_core::types::track_point::TrackPoint;
use trajectory_storage::batch::BatchCommand;
use trajectory_storage::TrajectoryStorageEngine;

use crate::cascade;
use crate::engine::AnalyzerBase;
use crate::lifecycle::TaskLifecycleManager;

pub const NAME: &str = "transport_mode";

/// Segments shorter than this are discarded entirely.
const MIN_SEGMENT_DURATION_S: i64 = 10;
const DEFAULT_CONFIDENCE: f64 = 0.8;
const ALGORITHM_VERSION: i32 = 1;

struct OpenSegment {
    mode: TransportMode,
    points: Vec<TrackPoint>,
    /// Overrides `points.first().ts` for the emitted `start_ts`/duration
    /// check — the previous run's own last point, when one exists.
    boundary_start_ts: Option<i64>,
    /// Overrides `points.last().ts` for the emitted `end_ts`/duration
    /// check — the point that triggered the transition out of this run.
    boundary_end_ts: Option<i64>,
}

impl OpenSegment {
    fn close(self) -> Option<Segment> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        let start_ts = self.boundary_start_ts.unwrap_or(first.ts);
        let end_ts = self.boundary_end_ts.unwrap_or(last.ts);
        let duration = end_ts - start_ts;
        if duration < MIN_SEGMENT_DURATION_S {
            return None;
        }

        let coords: Vec<(f64, f64)> = self.points.iter().map(|p| (p.lat, p.lon)).collect();
        let distance_m = polyline_distance_m(&coords);
        let avg_speed_kmh = if duration > 0 {
            (distance_m / duration as f64) * 3.6
        } else {
            0.0
        };
        let max_speed_kmh = self
            .points
            .iter()
            .filter_map(|p| p.speed)
            .fold(0.0_f64, f64::max)
            * 3.6;

        Some(Segment {
            id: 0,
            mode: self.mode,
            start_ts,
            end_ts,
            start_point_id: first.id,
            end_point_id: last.id,
            point_count: self.points.len() as i64,
            distance_m,
            duration_s: duration,
            avg_speed_kmh,
            max_speed_kmh,
            confidence: DEFAULT_CONFIDENCE,
            reason_codes: Vec::new(),
            metadata: serde_json::Value::Null,
            algorithm_version: ALGORITHM_VERSION,
        })
    }
}

pub struct TransportModeAnalyzer {
    base: AnalyzerBase,
    lifecycle: Arc<TaskLifecycleManager>,
}

impl TransportModeAnalyzer {
    pub fn new(storage: Arc<TrajectoryStorageEngine>, lifecycle: Arc<TaskLifecycleManager>, batch_size: usize) -> Self {
        Self {
            base: AnalyzerBase::new(storage, lifecycle.clone(), batch_size),
            lifecycle,
        }
    }

    fn clear_for_full_recompute(&self, storage: &TrajectoryStorageEngine) -> Result<(), AnalysisError> {
        storage.database().with_writer::<(), AnalysisError>(|conn| {
            // Children before parents: truncate best-effort downstream
            // caches, then the owned table.
            for child in cascade::children_of("segments") {
                cascade::truncate_best_effort(conn, child);
            }
            conn.execute("DELETE FROM segments", [])
                .map_err(|e| trajectory_core::errors::storage_error::StorageError::SqliteError {
                    message: e.to_string(),
                })?;
            Ok(())
        })
    }
}

impl Analyzer for TransportModeAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn execute(&self, task_id: TaskId, mode: AnalyzerMode, cancel: &CancellationToken) -> Result<(), AnalysisError> {
        if mode == AnalyzerMode::Full {
            self.clear_for_full_recompute(self.base.storage())?;
        }

        let mut current: Option<OpenSegment> = None;
        let mut segments_emitted: i64 = 0;

        let stats = self.base.run_over_points(task_id, cancel, 0, |batch| {
            let mut to_write: Vec<Segment> = Vec::new();

            for point in batch {
                // Outliers never contribute to a segment.
                if point.outlier_flag {
                    continue;
                }
                let Some(speed) = point.speed else { continue };
                let classified = TransportMode::classify(speed);

                match current.as_mut() {
                    Some(open) if open.mode == classified => {
                        open.points.push(point.clone());
                    }
                    Some(_) => {
                        let mut closed = current.take().unwrap();
                        let own_last_ts = closed.points.last().map(|p| p.ts);
                        closed.boundary_end_ts = Some(point.ts);
                        if let Some(seg) = closed.close() {
                            to_write.push(seg);
                        }
                        current = Some(OpenSegment {
                            mode: classified,
                            points: vec![point.clone()],
                            boundary_start_ts: own_last_ts,
                            boundary_end_ts: None,
                        });
                    }
                    None => {
                        current = Some(OpenSegment {
                            mode: classified,
                            points: vec![point.clone()],
                            boundary_start_ts: None,
                            boundary_end_ts: None,
                        });
                    }
                }
            }

            segments_emitted += to_write.len() as i64;
            if !to_write.is_empty() {
                self.base.storage().send_batch(BatchCommand::InsertSegments(to_write))?;
            }
            Ok(0)
        })?;

        // End-of-stream: close whatever segment is still open.
        if let Some(open) = current.take() {
            if let Some(seg) = open.close() {
                segments_emitted += 1;
                self.base
                    .storage()
                    .send_batch(BatchCommand::InsertSegments(vec![seg]))?;
                self.base.storage().flush_batch_sync()?;
            }
        }

        self.lifecycle.complete(
            task_id,
            serde_json::json!({
                "points_scanned": stats.processed,
                "segments_emitted": segments_emitted,
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
    use trajectory_core::types::track_point::{AdminLabels, QaStatus};

    fn point(id: i64, ts: i64, speed: f64) -> TrackPoint {
        TrackPoint {
            id,
            ts,
            lat: 0.0,
            lon: 0.0,
            altitude: None,
            speed: Some(speed),
            heading: None,
            accuracy: Some(5.0),
            admin: AdminLabels::default(),
            grid_id: None,
            outlier_flag: false,
            outlier_reason_codes: Vec::new(),
            qa_status: QaStatus::Pass,
        }
    }

    #[test]
    fn short_segment_is_discarded() {
        let open = OpenSegment {
            mode: TransportMode::Walk,
            points: vec![point(1, 0, 1.0), point(2, 5, 1.0)],
            boundary_start_ts: None,
            boundary_end_ts: None,
        };
        assert!(open.close().is_none());
    }

    #[test]
    fn segment_meeting_duration_emits_s1_walk() {
        let open = OpenSegment {
            mode: TransportMode::Walk,
            points: vec![point(1, 0, 1.0), point(2, 15, 1.0)],
            boundary_start_ts: None,
            boundary_end_ts: None,
        };
        let seg = open.close().unwrap();
        assert_eq!(seg.mode, TransportMode::Walk);
        assert!(seg.duration_s >= MIN_SEGMENT_DURATION_S);
    }

    #[test]
    fn mode_classification_bands() {
        assert_eq!(TransportMode::classify(1.0), TransportMode::Walk);
        assert_eq!(TransportMode::classify(5.0), TransportMode::Bike);
        assert_eq!(TransportMode::classify(20.0), TransportMode::Car);
        assert_eq!(TransportMode::classify(50.0), TransportMode::Train);
        assert_eq!(TransportMode::classify(100.0), TransportMode::Plane);
    }

    #[test]
    fn single_sample_runs_still_emit_via_shared_boundaries() {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        storage
            .send_batch(BatchCommand::InsertTrackPoints(vec![
                point(1, 0, 1.0),
                point(2, 30, 10.0),
                point(3, 60, 1.5),
            ]))
            .unwrap();
        storage.flush_batch_sync().unwrap();

        let analyzer = TransportModeAnalyzer::new(storage.clone(), lifecycle.clone(), 100);
        let task = lifecycle.create(NAME, TaskType::FullRecompute, serde_json::json!({})).unwrap();
        lifecycle.start(task.id).unwrap();
        analyzer.execute(task.id, AnalyzerMode::Full, &CancellationToken::new()).unwrap();

        let segments = storage
            .database()
            .with_reader(|conn| trajectory_storage::queries::segments::segments_in_range(conn, i64::MIN, i64::MAX))
            .unwrap();
        assert_eq!(segments.len(), 3);
        for seg in &segments {
            assert!(seg.duration_s >= MIN_SEGMENT_DURATION_S, "{:?} too short", seg);
        }
        assert_eq!(segments[0].mode, TransportMode::Walk);
        assert_eq!(segments[1].mode, TransportMode::Car);
        assert_eq!(segments[2].mode, TransportMode::Walk);
    }
}
