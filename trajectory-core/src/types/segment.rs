//! `Segment` — derived row written by transport-mode segmentation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportMode {
    Walk,
    Bike,
    Car,
    Train,
    Plane,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Walk => "WALK",
            Self::Bike => "BIKE",
            Self::Car => "CAR",
            Self::Train => "TRAIN",
            Self::Plane => "PLANE",
        }
    }

    /// Classify an instantaneous speed (m/s) into a transport-mode band.
    pub fn classify(speed_mps: f64) -> Self {
        if speed_mps < 2.0 {
            Self::Walk
        } else if speed_mps < 8.0 {
            Self::Bike
        } else if speed_mps < 40.0 {
            Self::Car
        } else if speed_mps < 60.0 {
            Self::Train
        } else {
            Self::Plane
        }
    }
}

/// A contiguous run of points sharing one transport mode.
///
/// Invariants: `end_ts >= start_ts + 10`; adjacent segments never share
/// the same mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    pub mode: TransportMode,
    pub start_ts: i64,
    pub end_ts: i64,
    pub start_point_id: i64,
    pub end_point_id: i64,
    pub point_count: i64,
    pub distance_m: f64,
    pub duration_s: i64,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub confidence: f64,
    pub reason_codes: Vec<String>,
    pub metadata: serde_json::Value,
    pub algorithm_version: i32,
}

impl Segment {
    pub fn duration(&self) -> i64 {
        self.end_ts - self.start_ts
    }
}
