//! `GridCell` — derived, hierarchical row (spec.md §3).
//!
//! `grid_id` is a geohash at precisions 4..7 or a tile id at levels
//! 8..15; the two are distinguished by the `grid_id`'s own format, not
//! by a separate column, matching the "grid identifier" field already
//! carried on `TrackPoint`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub grid_id: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub visit_count: i64,
    pub total_duration_s: i64,
    pub first_visit_ts: i64,
    pub last_visit_ts: i64,
}
