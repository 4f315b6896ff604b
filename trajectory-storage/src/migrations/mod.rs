//! Embedded schema migrations, versioned via SQLite's `user_version`
//! pragma. Each entry is applied in its own transaction; `run_migrations`
//! is idempotent and safe to call on every `DatabaseManager::open`.

use rusqlite::Connection;
use trajectory_core::errors::StorageError;

/// Ordered list of (version, schema statements). Version `N` is applied
/// when `user_version < N`; `user_version` is then set to `N`.
const MIGRATIONS: &[(u32, &str)] = &[
    (1, include_str!("sql/001_track_points.sql")),
    (2, include_str!("sql/002_segments.sql")),
    (3, include_str!("sql/003_stays_and_trips.sql")),
    (4, include_str!("sql/004_speed_events.sql")),
    (5, include_str!("sql/005_grid_cells.sql")),
    (6, include_str!("sql/006_bucketed_statistics.sql")),
    (7, include_str!("sql/007_analysis_tasks.sql")),
    (8, include_str!("sql/008_revisit_patterns.sql")),
];

pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .map(|v| v as u32)
        .map_err(|e| StorageError::SqliteError {
            message: format!("read user_version: {e}"),
        })
}

pub fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    let mut version = current_version(conn)?;

    for (migration_version, sql) in MIGRATIONS {
        if *migration_version <= version {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StorageError::SqliteError {
                message: format!("begin migration transaction: {e}"),
            })?;
        tx.execute_batch(sql)
            .map_err(|e| StorageError::MigrationFailed {
                version: *migration_version,
                message: e.to_string(),
            })?;
        tx.pragma_update(None, "user_version", migration_version)
            .map_err(|e| StorageError::MigrationFailed {
                version: *migration_version,
                message: format!("update user_version: {e}"),
            })?;
        tx.commit().map_err(|e| StorageError::MigrationFailed {
            version: *migration_version,
            message: format!("commit: {e}"),
        })?;

        version = *migration_version;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::pragmas::apply_pragmas;

    #[test]
    fn migrates_empty_db_to_latest() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), MIGRATIONS.len() as u32);
    }

    #[test]
    fn idempotent_on_rerun() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), MIGRATIONS.len() as u32);
    }

    #[test]
    fn creates_expected_tables() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for expected in [
            "track_points",
            "segments",
            "stay_segments",
            "trips",
            "speed_events",
            "grid_cells",
            "bucketed_statistics",
            "analysis_tasks",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }
}
