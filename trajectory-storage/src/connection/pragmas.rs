//! PRAGMA setup applied to every connection this crate opens: WAL
//! journaling for concurrent readers alongside the single writer,
//! foreign key enforcement, and a busy timeout so a reader never sees a
//! bare `SQLITE_BUSY` while the writer thread holds a transaction open.

use rusqlite::Connection;
use trajectory_core::errors::StorageError;

pub fn apply_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| StorageError::SqliteError {
            message: format!("set journal_mode: {e}"),
        })?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(|e| StorageError::SqliteError {
            message: format!("set synchronous: {e}"),
        })?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| StorageError::SqliteError {
            message: format!("set foreign_keys: {e}"),
        })?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(|e| StorageError::SqliteError {
            message: format!("set busy_timeout: {e}"),
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_without_error() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
