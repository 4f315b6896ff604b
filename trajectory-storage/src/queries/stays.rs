//! `stay_segments` table queries. Stay construction itself runs
//! out-of-process (spec.md §9); this crate only reads back the worker's
//! results for downstream analyzers (trip construction, revisit patterns).

use rusqlite::{params, Connection, Row};
use trajectory_core::errors::StorageError;
use trajectory_core::types::{AdminLabels, StaySegment};

fn row_to_stay(row: &Row) -> rusqlite::Result<StaySegment> {
    let reason_codes_json: String = row.get(11)?;
    let metadata_json: String = row.get(12)?;

    Ok(StaySegment {
        id: row.get(0)?,
        start_ts: row.get(1)?,
        end_ts: row.get(2)?,
        duration_s: row.get(3)?,
        center_lat: row.get(4)?,
        center_lon: row.get(5)?,
        geohash6: row.get(6)?,
        admin: AdminLabels {
            province: row.get(7)?,
            city: row.get(8)?,
            county: row.get(9)?,
            town: row.get(10)?,
        },
        stay_type: row.get(13)?,
        reason_codes: serde_json::from_str(&reason_codes_json).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null),
    })
}

const SELECT_COLUMNS: &str = "id, start_ts, end_ts, duration_s, center_lat, center_lon, geohash6,
     admin_province, admin_city, admin_county, admin_town, reason_codes, metadata, stay_type";

pub fn stays_in_range(
    conn: &Connection,
    start_ts: i64,
    end_ts: i64,
) -> Result<Vec<StaySegment>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM stay_segments WHERE start_ts < ?2 AND end_ts > ?1 ORDER BY start_ts"
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![start_ts, end_ts], row_to_stay)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?);
    }
    Ok(out)
}

pub fn significant_stays_in_range(
    conn: &Connection,
    start_ts: i64,
    end_ts: i64,
    min_dwell_s: i64,
) -> Result<Vec<StaySegment>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM stay_segments
         WHERE start_ts < ?2 AND end_ts > ?1 AND duration_s >= ?3 ORDER BY start_ts"
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![start_ts, end_ts, min_dwell_s], row_to_stay)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?);
    }
    Ok(out)
}
