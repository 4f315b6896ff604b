//! `grid_cells` table queries.

use rusqlite::{params, Connection, Row};
use trajectory_core::errors::StorageError;
use trajectory_core::types::GridCell;

fn row_to_grid_cell(row: &Row) -> rusqlite::Result<GridCell> {
    Ok(GridCell {
        grid_id: row.get(0)?,
        center_lat: row.get(1)?,
        center_lon: row.get(2)?,
        visit_count: row.get(3)?,
        total_duration_s: row.get(4)?,
        first_visit_ts: row.get(5)?,
        last_visit_ts: row.get(6)?,
    })
}

const SELECT_COLUMNS: &str =
    "grid_id, center_lat, center_lon, visit_count, total_duration_s, first_visit_ts, last_visit_ts";

pub fn get_grid_cell(conn: &Connection, grid_id: &str) -> Result<Option<GridCell>, StorageError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM grid_cells WHERE grid_id = ?1");
    conn.query_row(&sql, params![grid_id], row_to_grid_cell)
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(StorageError::SqliteError { message: other.to_string() }),
        })
}

pub fn most_visited_cells(
    conn: &Connection,
    limit: usize,
) -> Result<Vec<GridCell>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM grid_cells ORDER BY visit_count DESC LIMIT ?1"
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    let rows = stmt
        .query_map(params![limit as i64], row_to_grid_cell)
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| StorageError::SqliteError { message: e.to_string() })?);
    }
    Ok(out)
}
