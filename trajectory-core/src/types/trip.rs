//! `Trip` — derived row written by trip construction (spec.md §3, §4.5.5).
//!
//! Distinct from any segmentation-stage "trip"-shaped record (spec.md §9
//! open question: treated as a naming collision, not a shared type).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TripPurpose {
    Commute,
    Travel,
    Unknown,
}

impl TripPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commute => "COMMUTE",
            Self::Travel => "TRAVEL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Default confidence for each purpose band per §4.5.5.
    pub fn default_confidence(&self) -> f64 {
        match self {
            Self::Commute => 0.7,
            Self::Travel => 0.8,
            Self::Unknown => 0.5,
        }
    }
}

/// Invariant (spec.md §3): a trip is bounded by stays or by a configured
/// inter-segment gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: i64,
    pub date_bucket: String,
    pub sequence_number: i32,
    pub start_ts: i64,
    pub end_ts: i64,
    pub origin_stay_id: Option<i64>,
    pub destination_stay_id: Option<i64>,
    pub modes: Vec<String>,
    pub total_distance_m: f64,
    pub duration_s: i64,
    pub segment_count: i32,
    pub stay_count: i32,
    pub purpose: TripPurpose,
    pub confidence: f64,
}
