//! Dependency cascade data (spec.md §4.4, §9): "encode the cascade list
//! as data attached to each analyzer, not as imperative calls scattered
//! through code; tolerate missing child tables."
//!
//! The chain from spec.md §4.4:
//!
//! ```text
//! points -> outlier_detection -> transport_mode -> stay_detection
//!                                      |-> speed_events
//!                                      `-> trip_construction -> extreme_events
//! segments + stays -> trip_construction
//! points -> grid_system -> density_structure, revisit_pattern, rendering_metadata
//! segments -> directional_bias, road_overlap, movement_intensity
//! any -> footprint_statistics, stay_statistics, admin_view_engine
//! ```

/// One analyzer's declared owned table and the child (derived) tables
/// that must be truncated before it, during a full-recompute.
#[derive(Debug, Clone, Copy)]
pub struct CascadeEntry {
    /// The table this analyzer owns and truncates itself.
    pub owner_table: &'static str,
    /// Downstream tables truncated first, best-effort (spec.md §4.4:
    /// "missing tables do not abort the run").
    pub child_tables: &'static [&'static str],
}

/// Static cascade table, one entry per owner. Declared as data per the
/// teacher's §9 design note rather than as imperative truncate calls
/// scattered through each analyzer.
pub const CASCADE_TABLE: &[CascadeEntry] = &[
    CascadeEntry {
        owner_table: "track_points",
        child_tables: &["segments", "stay_segments", "grid_cells"],
    },
    CascadeEntry {
        owner_table: "segments",
        child_tables: &["speed_events", "render_segments_cache", "road_overlap_stats"],
    },
    CascadeEntry {
        owner_table: "stay_segments",
        child_tables: &["trips", "revisit_patterns"],
    },
    CascadeEntry {
        owner_table: "trips",
        child_tables: &["extreme_events"],
    },
    CascadeEntry {
        owner_table: "grid_cells",
        child_tables: &["density_structure", "revisit_patterns", "rendering_metadata"],
    },
];

/// Child tables declared for `owner_table`, or an empty slice if the
/// owner has no cascade entry.
pub fn children_of(owner_table: &str) -> &'static [&'static str] {
    CASCADE_TABLE
        .iter()
        .find(|e| e.owner_table == owner_table)
        .map(|e| e.child_tables)
        .unwrap_or(&[])
}

/// Truncate `table` if it exists, swallowing "no such table" as a
/// best-effort cascade operation (spec.md §4.4, §7: "errors from
/// optional cascade operations ... are logged and swallowed").
pub fn truncate_best_effort(conn: &rusqlite::Connection, table: &str) {
    let sql = format!("DELETE FROM {table}");
    if let Err(e) = conn.execute(&sql, []) {
        tracing::warn!(table, error = %e, "cascade truncate skipped (table likely absent)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_owner_has_children() {
        let children = children_of("segments");
        assert!(children.contains(&"speed_events"));
    }

    #[test]
    fn unknown_owner_has_no_children() {
        assert!(children_of("not_a_real_table").is_empty());
    }
}
