//! `StaySegment` — derived row written by stay construction, executed
//! out-of-process (spec.md §3, §4.5.3).

use serde::{Deserialize, Serialize};

use super::track_point::AdminLabels;

/// Invariant (spec.md §3): `duration >= configured minimum`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaySegment {
    pub id: i64,
    pub start_ts: i64,
    pub end_ts: i64,
    pub duration_s: i64,
    pub center_lat: f64,
    pub center_lon: f64,
    pub geohash6: String,
    pub admin: AdminLabels,
    pub stay_type: Option<String>,
    pub reason_codes: Vec<String>,
    pub metadata: serde_json::Value,
}

impl StaySegment {
    /// §4.5.5: stays with `duration >= 1800s` are "significant" and feed
    /// trip construction as candidate origins/destinations.
    pub fn is_significant(&self) -> bool {
        self.duration_s >= 1800
    }
}
