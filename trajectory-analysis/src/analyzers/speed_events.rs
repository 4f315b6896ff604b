//! Speed-event detection — a nested state machine over `CAR` segments
//! and their constituent points (spec.md §4.5.4).
//!
//! Unlike the point-stream analyzers, iteration here is segment-by-
//! segment rather than a single paged scan over `track_points`, so this
//! analyzer drives its own loop instead of going through
//! [`crate::engine::AnalyzerBase`] — the batching unit is a segment's
//! point set, not a fixed-size page of the whole table.

use std::sync::Arc;

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::config::SpeedEventConfig;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::traits::{Analyzer, PointReader};
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::segment::{Segment, TransportMode};
use trajectory_core::types::speed_event::SpeedEvent;
use trajectory_core::types::task::{AnalyzerMode, ProgressSnapshot};
use trajectory_core::types::track_point::TrackPoint;
use trajectory_storage::batch::BatchCommand;
use trajectory_storage::{queries, TrajectoryStorageEngine};

use crate::lifecycle::TaskLifecycleManager;

pub const NAME: &str = "speed_events";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventState {
    Idle,
    InEvent,
    Grace,
}

struct OpenEvent {
    start_ts: i64,
    last_high_speed_ts: i64,
    peak_ts: i64,
    peak_lat: f64,
    peak_lon: f64,
    max_speed_mps: f64,
    speeds: Vec<f64>,
    point_count: usize,
}

pub struct SpeedEventAnalyzer {
    storage: Arc<TrajectoryStorageEngine>,
    lifecycle: Arc<TaskLifecycleManager>,
    config: SpeedEventConfig,
}

impl SpeedEventAnalyzer {
    pub fn new(
        storage: Arc<TrajectoryStorageEngine>,
        lifecycle: Arc<TaskLifecycleManager>,
        config: SpeedEventConfig,
    ) -> Self {
        Self {
            storage,
            lifecycle,
            config,
        }
    }

    fn clear_for_full_recompute(&self) -> Result<(), AnalysisError> {
        self.storage
            .database()
            .with_writer::<(), AnalysisError>(|conn| {
                conn.execute("DELETE FROM speed_events", [])
                    .map_err(|e| trajectory_core::errors::storage_error::StorageError::SqliteError {
                        message: e.to_string(),
                    })?;
                Ok(())
            })
    }

    fn car_segments(&self) -> Result<Vec<Segment>, AnalysisError> {
        let all = self.storage.database().with_reader::<_, AnalysisError>(|conn| {
            queries::segments::segments_in_range(conn, i64::MIN, i64::MAX).map_err(AnalysisError::from)
        })?;
        Ok(all.into_iter().filter(|s| s.mode == TransportMode::Car).collect())
    }

    /// Detect events within one segment's points via the idle / in-event
    /// / grace state machine (spec.md §4.5.4).
    fn detect_events(&self, segment: &Segment, points: &[TrackPoint]) -> Vec<SpeedEvent> {
        let trigger = self.config.effective_trigger_speed_mps();
        let min_duration = self.config.effective_min_duration_s();
        let allowed_gap = self.config.effective_max_gap_s();

        let mut state = EventState::Idle;
        let mut open: Option<OpenEvent> = None;
        let mut events = Vec::new();

        for point in points {
            let speed = point.speed.unwrap_or(0.0);
            let above = speed >= trigger;

            match state {
                EventState::Idle => {
                    if above {
                        open = Some(OpenEvent {
                            start_ts: point.ts,
                            last_high_speed_ts: point.ts,
                            peak_ts: point.ts,
                            peak_lat: point.lat,
                            peak_lon: point.lon,
                            max_speed_mps: speed,
                            speeds: vec![speed],
                            point_count: 1,
                        });
                        state = EventState::InEvent;
                    }
                }
                EventState::InEvent => {
                    let ev = open.as_mut().expect("InEvent implies an open event");
                    if above {
                        ev.last_high_speed_ts = point.ts;
                        ev.point_count += 1;
                        ev.speeds.push(speed);
                        if speed > ev.max_speed_mps {
                            ev.max_speed_mps = speed;
                            ev.peak_ts = point.ts;
                            ev.peak_lat = point.lat;
                            ev.peak_lon = point.lon;
                        }
                    } else {
                        state = EventState::Grace;
                    }
                }
                EventState::Grace => {
                    let ev = open.as_mut().expect("Grace implies an open event");
                    let gap = (point.ts - ev.last_high_speed_ts) as f64;
                    if above && gap <= allowed_gap {
                        ev.last_high_speed_ts = point.ts;
                        ev.point_count += 1;
                        ev.speeds.push(speed);
                        if speed > ev.max_speed_mps {
                            ev.max_speed_mps = speed;
                            ev.peak_ts = point.ts;
                            ev.peak_lat = point.lat;
                            ev.peak_lon = point.lon;
                        }
                        state = EventState::InEvent;
                    } else if gap > allowed_gap {
                        if let Some(finished) = open.take() {
                            if let Some(event) = close_event(segment, &finished, min_duration) {
                                events.push(event);
                            }
                        }
                        state = EventState::Idle;
                    }
                }
            }
        }

        // End-of-segment: a speed event spanning the final point must
        // still close using the last observed high-speed timestamp
        // (spec.md §8 boundary behavior).
        if let Some(finished) = open.take() {
            if let Some(event) = close_event(segment, &finished, min_duration) {
                events.push(event);
            }
        }

        events
    }
}

fn close_event(segment: &Segment, open: &OpenEvent, min_duration: f64) -> Option<SpeedEvent> {
    let duration = (open.last_high_speed_ts - open.start_ts) as f64;
    if duration < min_duration {
        return None;
    }

    let avg_speed_mps = open.speeds.iter().sum::<f64>() / open.speeds.len().max(1) as f64;

    let mut confidence = 1.0;
    if duration < 120.0 {
        confidence *= 0.8;
    }
    if open.point_count < 5 {
        confidence *= 0.7;
    }
    if open.max_speed_mps < 40.0 {
        confidence *= 0.9;
    }

    let mut reason_codes = Vec::new();
    reason_codes.push(
        if open.max_speed_mps >= 60.0 {
            "VERY_HIGH_SPEED"
        } else if open.max_speed_mps >= 45.0 {
            "HIGH_SPEED"
        } else {
            "MODERATE_SPEED"
        }
        .to_string(),
    );
    reason_codes.push(if duration >= 300.0 { "SUSTAINED_DURATION" } else { "SHORT_DURATION" }.to_string());
    reason_codes.push(if open.point_count >= 20 { "DENSE_TRACE" } else { "SPARSE_TRACE" }.to_string());

    Some(SpeedEvent {
        id: 0,
        segment_id: segment.id,
        start_ts: open.start_ts,
        end_ts: open.last_high_speed_ts,
        peak_ts: open.peak_ts,
        peak_lat: open.peak_lat,
        peak_lon: open.peak_lon,
        max_speed_mps: open.max_speed_mps,
        avg_speed_mps,
        admin: Default::default(),
        confidence,
        reason_codes,
    })
}

impl Analyzer for SpeedEventAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn execute(&self, task_id: TaskId, mode: AnalyzerMode, cancel: &CancellationToken) -> Result<(), AnalysisError> {
        if mode == AnalyzerMode::Full {
            self.clear_for_full_recompute()?;
        }

        let segments = self.car_segments()?;
        let mut events_emitted: i64 = 0;
        let mut segments_scanned: i64 = 0;

        for segment in &segments {
            let points = self
                .storage
                .read_points_in_range(segment.start_ts, segment.end_ts + 1)?;
            let events = self.detect_events(segment, &points);
            events_emitted += events.len() as i64;
            if !events.is_empty() {
                self.storage.send_batch(BatchCommand::InsertSpeedEvents(events))?;
            }

            segments_scanned += 1;
            self.storage.flush_batch_sync()?;
            self.lifecycle.report_progress(task_id, segments_scanned, 0)?;

            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
        }

        self.lifecycle.complete(
            task_id,
            serde_json::json!({
                "segments_scanned": segments_scanned,
                "events_emitted": events_emitted,
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
    use trajectory_core::types::track_point::{AdminLabels, QaStatus};

    fn point(id: i64, ts: i64, speed: f64) -> TrackPoint {
        TrackPoint {
            id,
            ts,
            lat: 1.0,
            lon: 1.0,
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

    fn segment(start_ts: i64, end_ts: i64) -> Segment {
        Segment {
            id: 1,
            mode: TransportMode::Car,
            start_ts,
            end_ts,
            start_point_id: 1,
            end_point_id: 2,
            point_count: 0,
            distance_m: 0.0,
            duration_s: end_ts - start_ts,
            avg_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
            confidence: 0.8,
            reason_codes: Vec::new(),
            metadata: serde_json::Value::Null,
            algorithm_version: 1,
        }
    }

    fn analyzer() -> SpeedEventAnalyzer {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        SpeedEventAnalyzer::new(storage, lifecycle, SpeedEventConfig::default())
    }

    /// S4: a CAR segment of 200 points, all at 35 m/s, spanning 200 s.
    #[test]
    fn sustained_speed_emits_one_event_s4() {
        let a = analyzer();
        let seg = segment(0, 199);
        let points: Vec<TrackPoint> = (0..200).map(|i| point(i, i, 35.0)).collect();

        let events = a.detect_events(&seg, &points);
        assert_eq!(events.len(), 1);
        let ev = &events[0];
        assert_eq!(ev.max_speed_mps, 35.0);
        assert_eq!(ev.duration(), 199);
        assert!((ev.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn event_spanning_final_point_closes_at_last_high_speed() {
        let a = analyzer();
        let seg = segment(0, 99);
        let points: Vec<TrackPoint> = (0..100).map(|i| point(i, i, 40.0)).collect();
        let events = a.detect_events(&seg, &points);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].end_ts, 99);
    }

    #[test]
    fn sub_threshold_speed_never_opens_event() {
        let a = analyzer();
        let seg = segment(0, 99);
        let points: Vec<TrackPoint> = (0..100).map(|i| point(i, i, 10.0)).collect();
        assert!(a.detect_events(&seg, &points).is_empty());
    }
}
