//! Trip construction: merge transport-mode segments and significant
//! stays into `Trip` rows, bounded by a stay or by a configured
//! inter-segment gap.
//!
//! Segments and stays are both read in full and merge-walked by time;
//! unlike the point-stream analyzers this has no meaningful notion of
//! "new since last run" (a gap can only be correctly judged against
//! its neighbors), so every run rebuilds the whole `trips` table.

use std::collections::HashMap;
use std::sync::Arc;

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::config::TripConfig;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::traits::Analyzer;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::segment::Segment;
use trajectory_core::types::stay::StaySegment;
use trajectory_core::types::task::{AnalyzerMode, ProgressSnapshot};
use trajectory_core::types::track_point::AdminLabels;
use trajectory_core::types::trip::{Trip, TripPurpose};
use trajectory_storage::batch::BatchCommand;
use trajectory_storage::{queries, TrajectoryStorageEngine};

use crate::calendar;
use crate::cascade;
use crate::lifecycle::TaskLifecycleManager;

pub const NAME: &str = "trip_construction";

/// A commute is a short trip bounded by stays sharing a city on both
/// ends. Beyond this duration the trip can no longer be a commute
/// regardless of admin labels.
const COMMUTE_MAX_DURATION_S: i64 = 7200;

struct OpenTrip {
    start_ts: i64,
    origin_stay_id: Option<i64>,
    origin_admin: Option<AdminLabels>,
    modes: Vec<String>,
    mode_distance: HashMap<String, f64>,
    total_distance_m: f64,
    segment_count: i32,
    last_end_ts: i64,
}

impl OpenTrip {
    fn start(segment: &Segment, origin_stay: Option<&StaySegment>) -> Self {
        let mut trip = Self {
            start_ts: segment.start_ts,
            origin_stay_id: origin_stay.map(|s| s.id),
            origin_admin: origin_stay.map(|s| s.admin.clone()),
            modes: Vec::new(),
            mode_distance: HashMap::new(),
            total_distance_m: 0.0,
            segment_count: 0,
            last_end_ts: segment.start_ts,
        };
        trip.push(segment);
        trip
    }

    fn push(&mut self, segment: &Segment) {
        let mode = segment.mode.as_str().to_string();
        if !self.modes.contains(&mode) {
            self.modes.push(mode.clone());
        }
        *self.mode_distance.entry(mode).or_insert(0.0) += segment.distance_m;
        self.total_distance_m += segment.distance_m;
        self.segment_count += 1;
        self.last_end_ts = segment.end_ts;
    }

    fn close(self, sequence_number: i32, destination_stay: Option<&StaySegment>) -> Trip {
        let duration_s = self.last_end_ts - self.start_ts;
        let destination_stay_id = destination_stay.map(|s| s.id);
        let stay_count = self.origin_stay_id.is_some() as i32 + destination_stay_id.is_some() as i32;

        let purpose = match (self.origin_admin.as_ref(), destination_stay.map(|s| &s.admin)) {
            (Some(origin), Some(destination)) => {
                let share_city = match (&origin.city, &destination.city) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                };
                let cross_province = match (&origin.province, &destination.province) {
                    (Some(a), Some(b)) => a != b,
                    _ => false,
                };
                if duration_s < COMMUTE_MAX_DURATION_S && share_city {
                    TripPurpose::Commute
                } else if cross_province {
                    TripPurpose::Travel
                } else {
                    TripPurpose::Unknown
                }
            }
            _ => TripPurpose::Unknown,
        };

        // Primary mode: the one contributing the most distance, ties
        // broken by first-appearance order.
        let primary_mode = self
            .modes
            .iter()
            .max_by(|a, b| {
                self.mode_distance[*a]
                    .partial_cmp(&self.mode_distance[*b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned();
        let mut modes = self.modes;
        if let Some(primary) = primary_mode {
            if let Some(pos) = modes.iter().position(|m| *m == primary) {
                modes.swap(0, pos);
            }
        }

        Trip {
            id: 0,
            date_bucket: calendar::day_bucket(self.start_ts),
            sequence_number,
            start_ts: self.start_ts,
            end_ts: self.last_end_ts,
            origin_stay_id: self.origin_stay_id,
            destination_stay_id,
            modes,
            total_distance_m: self.total_distance_m,
            duration_s,
            segment_count: self.segment_count,
            stay_count,
            purpose,
            confidence: purpose.default_confidence(),
        }
    }
}

/// A significant stay whose whole interval falls inside `(gap_start,
/// gap_end)`, i.e. the stay actually occurred during the inter-segment
/// gap rather than merely overlapping its edges.
fn stay_within_gap(stays: &[StaySegment], gap_start: i64, gap_end: i64) -> Option<&StaySegment> {
    stays
        .iter()
        .find(|s| s.start_ts >= gap_start && s.end_ts <= gap_end)
}

pub struct TripConstructionAnalyzer {
    storage: Arc<TrajectoryStorageEngine>,
    lifecycle: Arc<TaskLifecycleManager>,
    config: TripConfig,
    significant_dwell_s: i64,
}

impl TripConstructionAnalyzer {
    pub fn new(
        storage: Arc<TrajectoryStorageEngine>,
        lifecycle: Arc<TaskLifecycleManager>,
        config: TripConfig,
        significant_dwell_s: i64,
    ) -> Self {
        Self {
            storage,
            lifecycle,
            config,
            significant_dwell_s,
        }
    }

    fn rebuild(&self) -> Result<(), AnalysisError> {
        self.storage.database().with_writer::<(), AnalysisError>(|conn| {
            for child in cascade::children_of("trips") {
                cascade::truncate_best_effort(conn, child);
            }
            conn.execute("DELETE FROM trips", [])
                .map_err(|e| trajectory_core::errors::storage_error::StorageError::SqliteError {
                    message: e.to_string(),
                })?;
            Ok(())
        })
    }

    /// Merge-walk segments and significant stays by time, producing
    /// every trip in one pass.
    fn build_trips(&self, segments: &[Segment], stays: &[StaySegment]) -> Vec<Trip> {
        let gap_s = self.config.effective_gap_s() as i64;
        let mut trips = Vec::new();
        let mut sequence: HashMap<String, i32> = HashMap::new();
        let mut open: Option<OpenTrip> = None;

        for segment in segments {
            match open.as_mut() {
                None => {
                    // A stay ending just before the very first segment
                    // bounds its origin just as a mid-gap stay would.
                    let origin = stays
                        .iter()
                        .filter(|s| s.end_ts <= segment.start_ts && segment.start_ts - s.end_ts <= gap_s)
                        .max_by_key(|s| s.end_ts);
                    open = Some(OpenTrip::start(segment, origin));
                }
                Some(current) => {
                    let gap_start = current.last_end_ts;
                    let gap_end = segment.start_ts;

                    if let Some(stay) = stay_within_gap(stays, gap_start, gap_end) {
                        let finished = open.take().unwrap();
                        trips.push(finish_trip(finished, Some(stay), &mut sequence));
                        open = Some(OpenTrip::start(segment, Some(stay)));
                    } else if gap_end - gap_start > gap_s {
                        let finished = open.take().unwrap();
                        trips.push(finish_trip(finished, None, &mut sequence));
                        open = Some(OpenTrip::start(segment, None));
                    } else {
                        current.push(segment);
                    }
                }
            }
        }

        if let Some(finished) = open.take() {
            // A stay starting just after the final segment bounds its
            // destination symmetrically with the leading-stay check.
            let destination = stays
                .iter()
                .filter(|s| s.start_ts >= finished.last_end_ts && s.start_ts - finished.last_end_ts <= gap_s)
                .min_by_key(|s| s.start_ts);
            trips.push(finish_trip(finished, destination, &mut sequence));
        }

        trips
    }
}

fn finish_trip(open: OpenTrip, destination_stay: Option<&StaySegment>, sequence: &mut HashMap<String, i32>) -> Trip {
    let date_bucket = calendar::day_bucket(open.start_ts);
    let seq = sequence.entry(date_bucket).or_insert(0);
    *seq += 1;
    open.close(*seq, destination_stay)
}

impl Analyzer for TripConstructionAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn execute(&self, task_id: TaskId, _mode: AnalyzerMode, cancel: &CancellationToken) -> Result<(), AnalysisError> {
        self.rebuild()?;

        let (segments, stays) = self.storage.database().with_reader::<_, AnalysisError>(|conn| {
            let segments = queries::segments::segments_in_range(conn, i64::MIN, i64::MAX)?;
            let stays = queries::stays::significant_stays_in_range(
                conn,
                i64::MIN,
                i64::MAX,
                self.significant_dwell_s,
            )?;
            Ok((segments, stays))
        })?;

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let trips = self.build_trips(&segments, &stays);
        let trip_count = trips.len() as i64;
        if !trips.is_empty() {
            self.storage.send_batch(BatchCommand::InsertTrips(trips))?;
        }
        self.storage.flush_batch_sync()?;
        self.lifecycle.report_progress(task_id, trip_count, 0)?;

        self.lifecycle.complete(
            task_id,
            serde_json::json!({
                "segments_considered": segments.len(),
                "stays_considered": stays.len(),
                "trips_emitted": trip_count,
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
    use trajectory_core::types::segment::TransportMode;
    use trajectory_core::types::track_point::AdminLabels;

    fn segment(id: i64, mode: TransportMode, start_ts: i64, end_ts: i64, distance_m: f64) -> Segment {
        Segment {
            id,
            mode,
            start_ts,
            end_ts,
            start_point_id: 1,
            end_point_id: 2,
            point_count: 10,
            distance_m,
            duration_s: end_ts - start_ts,
            avg_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
            confidence: 0.8,
            reason_codes: Vec::new(),
            metadata: serde_json::Value::Null,
            algorithm_version: 1,
        }
    }

    fn stay(id: i64, start_ts: i64, end_ts: i64) -> StaySegment {
        stay_with_admin(id, start_ts, end_ts, AdminLabels::default())
    }

    fn stay_with_admin(id: i64, start_ts: i64, end_ts: i64, admin: AdminLabels) -> StaySegment {
        StaySegment {
            id,
            start_ts,
            end_ts,
            duration_s: end_ts - start_ts,
            center_lat: 0.0,
            center_lon: 0.0,
            geohash6: "abcdef".to_string(),
            admin,
            stay_type: None,
            reason_codes: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    fn analyzer() -> TripConstructionAnalyzer {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        TripConstructionAnalyzer::new(storage, lifecycle, TripConfig::default(), 1800)
    }

    #[test]
    fn adjacent_segments_merge_into_one_trip() {
        let a = analyzer();
        let segments = vec![
            segment(1, TransportMode::Walk, 0, 100, 100.0),
            segment(2, TransportMode::Walk, 110, 300, 200.0),
        ];
        let trips = a.build_trips(&segments, &[]);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].segment_count, 2);
    }

    #[test]
    fn large_gap_without_stay_splits_trips() {
        let a = analyzer();
        let segments = vec![
            segment(1, TransportMode::Walk, 0, 100, 100.0),
            segment(2, TransportMode::Walk, 100 + 7201, 100 + 7201 + 50, 50.0),
        ];
        let trips = a.build_trips(&segments, &[]);
        assert_eq!(trips.len(), 2);
        assert!(trips[0].destination_stay_id.is_none());
    }

    #[test]
    fn significant_stay_in_gap_bounds_both_trips() {
        let a = analyzer();
        let segments = vec![
            segment(1, TransportMode::Walk, 0, 100, 100.0),
            segment(2, TransportMode::Car, 200, 400, 5000.0),
        ];
        let stays = vec![stay(9, 100, 200)];
        let trips = a.build_trips(&segments, &stays);
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].destination_stay_id, Some(9));
        assert_eq!(trips[1].origin_stay_id, Some(9));
    }

    fn home_city_admin() -> AdminLabels {
        AdminLabels {
            province: Some("hebei".to_string()),
            city: Some("beijing".to_string()),
            county: None,
            town: None,
        }
    }

    #[test]
    fn short_same_city_trip_classified_as_commute() {
        let a = analyzer();
        let segments = vec![segment(1, TransportMode::Car, 0, 1000, 10_000.0)];
        let stays = vec![
            stay_with_admin(1, -1000, 0, home_city_admin()),
            stay_with_admin(2, 1000, 2000, home_city_admin()),
        ];
        let trips = a.build_trips(&segments, &stays);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].origin_stay_id, Some(1));
        assert_eq!(trips[0].destination_stay_id, Some(2));
        assert_eq!(trips[0].purpose, TripPurpose::Commute);
    }

    #[test]
    fn cross_province_trip_classified_as_travel() {
        let a = analyzer();
        let segments = vec![segment(1, TransportMode::Car, 0, 1000, 10_000.0)];
        let origin = home_city_admin();
        let destination = AdminLabels {
            province: Some("guangdong".to_string()),
            city: Some("shenzhen".to_string()),
            county: None,
            town: None,
        };
        let stays = vec![
            stay_with_admin(1, -1000, 0, origin),
            stay_with_admin(2, 1000, 2000, destination),
        ];
        let trips = a.build_trips(&segments, &stays);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].purpose, TripPurpose::Travel);
    }

    #[test]
    fn missing_admin_labels_classified_as_unknown() {
        let a = analyzer();
        let segments = vec![segment(1, TransportMode::Car, 0, 1000, 10_000.0)];
        let stays = vec![stay(1, -1000, 0), stay(2, 1000, 2000)];
        let trips = a.build_trips(&segments, &stays);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].purpose, TripPurpose::Unknown);
    }
}
