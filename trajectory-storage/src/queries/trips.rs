//! `trips` table queries.

use rusqlite::{params, Connection, Row};
use trajectory_core::errors::StorageError;
use trajectory_core::types::{Trip, TripPurpose};

fn row_to_trip(row: &Row) -> rusqlite::Result<Trip> {
    let purpose_str: String = row.get(12)?;
    let modes_json: String = row.get(7)?;

    Ok(Trip {
        id: row.get(0)?,
        date_bucket: row.get(1)?,
        sequence_number: row.get(2)?,
        start_ts: row.get(3)?,
        end_ts: row.get(4)?,
        origin_stay_id: row.get(5)?,
        destination_stay_id: row.get(6)?,
        modes: serde_json::from_str(&modes_json).unwrap_or_default(),
        total_distance_m: row.get(8)?,
        duration_s: row.get(9)?,
        segment_count: row.get(10)?,
        stay_count: row.get(11)?,
        purpose: parse_purpose(&purpose_str),
        confidence: row.get(13)?,
    })
}

fn parse_purpose(s: &str) -> TripPurpose {
    match s {
        "COMMUTE" => TripPurpose::Commute,
        "TRAVEL" => TripPurpose::Travel,
        _ => TripPurpose::Unknown,
    }
}

const SELECT_COLUMNS: &str = "id, date_bucket, sequence_number, start_ts, end_ts,
     origin_stay_id, destination_stay_id, modes, total_distance_m, duration_s,
     segment_count, stay_count, purpose, confidence";

pub fn trips_for_date_bucket(
    conn: &Connection,
    date_bucket: &str,
) -> Result<Vec<Trip>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM trips WHERE date_bucket = ?1 ORDER BY sequence_number"
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![date_bucket], row_to_trip)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?);
    }
    Ok(out)
}
