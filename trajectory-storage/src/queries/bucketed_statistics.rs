//! `bucketed_statistics` table queries (spec.md §4.5.7).

use rusqlite::{params, Connection, Row};
use trajectory_core::errors::StorageError;
use trajectory_core::types::{AreaType, BucketType, BucketedStatistic};

fn row_to_stat(row: &Row) -> rusqlite::Result<BucketedStatistic> {
    let visit_days_json: String = row.get(4)?;
    Ok(BucketedStatistic {
        count: row.get(0)?,
        sum: row.get(1)?,
        max: row.get(2)?,
        min: row.get(3)?,
        visit_days: serde_json::from_str(&visit_days_json).unwrap_or_default(),
    })
}

const SELECT_COLUMNS: &str = "count, sum, max, min, visit_days";

#[allow(clippy::too_many_arguments)]
pub fn get_statistic(
    conn: &Connection,
    metric: &str,
    bucket_type: BucketType,
    bucket_key: &str,
    area_type: AreaType,
    area_key: &str,
    mode_filter: Option<&str>,
) -> Result<Option<BucketedStatistic>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM bucketed_statistics
         WHERE metric = ?1 AND bucket_type = ?2 AND bucket_key = ?3 AND area_type = ?4
           AND area_key = ?5 AND mode_filter = ?6"
    );
    conn.query_row(
        &sql,
        params![
            metric,
            bucket_type.as_str(),
            bucket_key,
            area_type.as_str(),
            area_key,
            mode_filter.unwrap_or(""),
        ],
        row_to_stat,
    )
    .map(Some)
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(StorageError::SqliteError { message: other.to_string() }),
    })
}

pub fn statistics_for_area(
    conn: &Connection,
    metric: &str,
    area_type: AreaType,
    area_key: &str,
) -> Result<Vec<BucketedStatistic>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM bucketed_statistics
         WHERE metric = ?1 AND area_type = ?2 AND area_key = ?3"
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![metric, area_type.as_str(), area_key], row_to_stat)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?);
    }
    Ok(out)
}

/// Clears only the rows owned by `metric`, leaving the other
/// statistic families sharing this table untouched.
pub fn delete_metric(conn: &Connection, metric: &str) -> Result<(), StorageError> {
    conn.execute("DELETE FROM bucketed_statistics WHERE metric = ?1", params![metric])
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    Ok(())
}
