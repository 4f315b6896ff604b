//! `track_points` table queries — the read side of `PointReader`.

use rusqlite::{params, Connection, Row};
use trajectory_core::errors::StorageError;
use trajectory_core::types::{AdminLabels, QaStatus, TrackPoint};

fn row_to_track_point(row: &Row) -> rusqlite::Result<TrackPoint> {
    let qa_status_str: String = row.get(15)?;
    let reason_codes_json: String = row.get(14)?;
    let qa_status = qa_status_str.parse().unwrap_or(QaStatus::Pass);
    let outlier_reason_codes: Vec<String> =
        serde_json::from_str(&reason_codes_json).unwrap_or_default();

    Ok(TrackPoint {
        id: row.get(0)?,
        ts: row.get(1)?,
        lat: row.get(2)?,
        lon: row.get(3)?,
        altitude: row.get(4)?,
        speed: row.get(5)?,
        heading: row.get(6)?,
        accuracy: row.get(7)?,
        admin: AdminLabels {
            province: row.get(8)?,
            city: row.get(9)?,
            county: row.get(10)?,
            town: row.get(11)?,
        },
        grid_id: row.get(12)?,
        outlier_flag: row.get(13)?,
        outlier_reason_codes,
        qa_status,
    })
}

const SELECT_COLUMNS: &str = "id, ts, lat, lon, altitude, speed, heading, accuracy,
     admin_province, admin_city, admin_county, admin_town,
     grid_id, outlier_flag, outlier_reason_codes, qa_status";

pub fn read_points_after(
    conn: &Connection,
    after_id: i64,
    limit: usize,
) -> Result<Vec<TrackPoint>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM track_points WHERE id > ?1 ORDER BY id LIMIT ?2"
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    let rows = stmt
        .query_map(params![after_id, limit as i64], row_to_track_point)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    collect(rows)
}

pub fn read_points_in_range(
    conn: &Connection,
    start_ts: i64,
    end_ts: i64,
) -> Result<Vec<TrackPoint>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM track_points WHERE ts >= ?1 AND ts < ?2 ORDER BY ts"
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    let rows = stmt
        .query_map(params![start_ts, end_ts], row_to_track_point)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    collect(rows)
}

pub fn total_point_count(conn: &Connection) -> Result<i64, StorageError> {
    conn.query_row("SELECT COUNT(*) FROM track_points", [], |row| row.get(0))
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })
}

fn collect(
    rows: impl Iterator<Item = rusqlite::Result<TrackPoint>>,
) -> Result<Vec<TrackPoint>, StorageError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?);
    }
    Ok(out)
}
