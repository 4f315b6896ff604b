//! `RevisitPattern` — derived row written by revisit-pattern detection
//! (spec.md §3, §4.5.6). Keyed by `geohash6`, fully rebuilt each run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisitPattern {
    pub geohash6: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub visit_count: i64,
    pub first_visit_ts: i64,
    pub last_visit_ts: i64,
    pub total_duration_s: i64,
    pub mean_interval_s: f64,
    pub stddev_interval_s: f64,
    /// `1 / (1 + stddev_interval_s / mean_interval_s)`; 1.0 for
    /// perfectly evenly spaced visits, approaching 0 as intervals
    /// become erratic (spec.md §4.5.6).
    pub regularity_score: f64,
    /// `ln(1 + visit_count) * ln(1 + total_duration_s)`: rewards both
    /// frequency and dwell time without letting either dominate alone.
    pub revisit_strength: f64,
    pub pattern_flags: Vec<String>,
}
