//! `revisit_patterns` table queries (spec.md §4.5.6).

use rusqlite::{params, Connection, Row};
use trajectory_core::errors::StorageError;
use trajectory_core::types::RevisitPattern;

fn row_to_pattern(row: &Row) -> rusqlite::Result<RevisitPattern> {
    let pattern_flags_json: String = row.get(11)?;
    Ok(RevisitPattern {
        geohash6: row.get(0)?,
        center_lat: row.get(1)?,
        center_lon: row.get(2)?,
        visit_count: row.get(3)?,
        first_visit_ts: row.get(4)?,
        last_visit_ts: row.get(5)?,
        total_duration_s: row.get(6)?,
        mean_interval_s: row.get(7)?,
        stddev_interval_s: row.get(8)?,
        regularity_score: row.get(9)?,
        revisit_strength: row.get(10)?,
        pattern_flags: serde_json::from_str(&pattern_flags_json).unwrap_or_default(),
    })
}

const SELECT_COLUMNS: &str = "geohash6, center_lat, center_lon, visit_count, first_visit_ts,
     last_visit_ts, total_duration_s, mean_interval_s, stddev_interval_s,
     regularity_score, revisit_strength, pattern_flags";

pub fn most_frequented(conn: &Connection, limit: usize) -> Result<Vec<RevisitPattern>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM revisit_patterns ORDER BY visit_count DESC LIMIT ?1"
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![limit as i64], row_to_pattern)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?);
    }
    Ok(out)
}
