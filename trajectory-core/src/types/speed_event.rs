//! `SpeedEvent` — derived row written by speed-event detection
//! (spec.md §3, §4.5.4).

use serde::{Deserialize, Serialize};

use super::track_point::AdminLabels;

/// Invariant (spec.md §8): `end_ts - start_ts >= 60` and
/// `max_speed >= min_event_speed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedEvent {
    pub id: i64,
    pub segment_id: i64,
    pub start_ts: i64,
    pub end_ts: i64,
    pub peak_ts: i64,
    pub peak_lat: f64,
    pub peak_lon: f64,
    pub max_speed_mps: f64,
    pub avg_speed_mps: f64,
    pub admin: AdminLabels,
    pub confidence: f64,
    pub reason_codes: Vec<String>,
}

impl SpeedEvent {
    pub fn duration(&self) -> i64 {
        self.end_ts - self.start_ts
    }
}
