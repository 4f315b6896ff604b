//! `segments` table queries, used by speed-event detection and trip
//! construction to read back transport-mode segments.

use rusqlite::{params, Connection, Row};
use trajectory_core::errors::StorageError;
use trajectory_core::types::{Segment, TransportMode};

fn row_to_segment(row: &Row) -> rusqlite::Result<Segment> {
    let mode_str: String = row.get(1)?;
    let reason_codes_json: String = row.get(12)?;
    let metadata_json: String = row.get(13)?;

    Ok(Segment {
        id: row.get(0)?,
        mode: parse_mode(&mode_str),
        start_ts: row.get(2)?,
        end_ts: row.get(3)?,
        start_point_id: row.get(4)?,
        end_point_id: row.get(5)?,
        point_count: row.get(6)?,
        distance_m: row.get(7)?,
        duration_s: row.get(8)?,
        avg_speed_kmh: row.get(9)?,
        max_speed_kmh: row.get(10)?,
        confidence: row.get(11)?,
        reason_codes: serde_json::from_str(&reason_codes_json).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null),
        algorithm_version: row.get(14)?,
    })
}

fn parse_mode(s: &str) -> TransportMode {
    match s {
        "WALK" => TransportMode::Walk,
        "BIKE" => TransportMode::Bike,
        "CAR" => TransportMode::Car,
        "TRAIN" => TransportMode::Train,
        _ => TransportMode::Plane,
    }
}

const SELECT_COLUMNS: &str = "id, mode, start_ts, end_ts, start_point_id, end_point_id,
     point_count, distance_m, duration_s, avg_speed_kmh, max_speed_kmh, confidence,
     reason_codes, metadata, algorithm_version";

pub fn segments_in_range(
    conn: &Connection,
    start_ts: i64,
    end_ts: i64,
) -> Result<Vec<Segment>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM segments WHERE start_ts < ?2 AND end_ts > ?1 ORDER BY start_ts"
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![start_ts, end_ts], row_to_segment)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?);
    }
    Ok(out)
}
