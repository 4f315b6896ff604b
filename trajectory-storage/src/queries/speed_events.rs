//! `speed_events` table queries.

use rusqlite::{params, Connection, Row};
use trajectory_core::errors::StorageError;
use trajectory_core::types::{AdminLabels, SpeedEvent};

fn row_to_speed_event(row: &Row) -> rusqlite::Result<SpeedEvent> {
    let reason_codes_json: String = row.get(13)?;
    Ok(SpeedEvent {
        id: row.get(0)?,
        segment_id: row.get(1)?,
        start_ts: row.get(2)?,
        end_ts: row.get(3)?,
        peak_ts: row.get(4)?,
        peak_lat: row.get(5)?,
        peak_lon: row.get(6)?,
        max_speed_mps: row.get(7)?,
        avg_speed_mps: row.get(8)?,
        admin: AdminLabels {
            province: row.get(9)?,
            city: row.get(10)?,
            county: row.get(11)?,
            town: row.get(12)?,
        },
        confidence: row.get(14)?,
        reason_codes: serde_json::from_str(&reason_codes_json).unwrap_or_default(),
    })
}

const SELECT_COLUMNS: &str = "id, segment_id, start_ts, end_ts, peak_ts, peak_lat, peak_lon,
     max_speed_mps, avg_speed_mps, admin_province, admin_city, admin_county, admin_town,
     reason_codes, confidence";

pub fn speed_events_for_segment(
    conn: &Connection,
    segment_id: i64,
) -> Result<Vec<SpeedEvent>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM speed_events WHERE segment_id = ?1 ORDER BY start_ts"
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![segment_id], row_to_speed_event)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?);
    }
    Ok(out)
}
