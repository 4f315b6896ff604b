//! Connection management: a single writer connection guarded by a
//! mutex, and a small hand-rolled pool of reader connections (the
//! workspace has no dependency on `r2d2`, so this follows the simplest
//! shape that gets WAL's concurrent-reader property without pulling one
//! in).

pub mod pragmas;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;
use trajectory_core::errors::StorageError;

use crate::migrations;

const DEFAULT_READER_POOL_SIZE: usize = 4;

/// Owns the single write connection and a bounded pool of read
/// connections for a trajectory database file (or an in-memory
/// instance, for tests).
pub struct DatabaseManager {
    path: Option<PathBuf>,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
    reader_pool_size: usize,
}

impl DatabaseManager {
    /// Open (creating if needed) a file-backed database, apply pragmas,
    /// and run any pending migrations.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let writer = Self::new_connection(Some(path))?;
        migrations::run_migrations(&writer)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            writer: Mutex::new(writer),
            readers: Mutex::new(Vec::new()),
            reader_pool_size: DEFAULT_READER_POOL_SIZE,
        })
    }

    /// Open an in-memory database (for tests). Each call is a distinct,
    /// unshared database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let writer = Self::new_connection(None)?;
        migrations::run_migrations(&writer)?;
        Ok(Self {
            path: None,
            writer: Mutex::new(writer),
            readers: Mutex::new(Vec::new()),
            reader_pool_size: DEFAULT_READER_POOL_SIZE,
        })
    }

    fn new_connection(path: Option<&Path>) -> Result<Connection, StorageError> {
        let conn = match path {
            Some(p) => Connection::open(p).map_err(|e| StorageError::SqliteError {
                message: format!("open {}: {e}", p.display()),
            })?,
            None => Connection::open_in_memory().map_err(|e| StorageError::SqliteError {
                message: e.to_string(),
            })?,
        };
        pragmas::apply_pragmas(&conn)?;
        Ok(conn)
    }

    /// A fresh connection to the same database, handed to the
    /// `BatchWriter` thread so it owns its own `Connection` rather than
    /// contending with `with_writer` callers for the mutex.
    pub fn open_batch_connection(&self) -> Result<Connection, StorageError> {
        Self::new_connection(self.path.as_deref())
    }

    /// Run `f` against the write connection, serialized with every
    /// other `with_writer` caller on this `DatabaseManager`. Generic
    /// over the error type so callers above this crate (e.g. the
    /// `AnalysisError`-returning `TaskStore` impl) don't have to map a
    /// bare `StorageError` at every call site.
    pub fn with_writer<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let conn = self.writer.lock().map_err(|_| {
            StorageError::SqliteError {
                message: "writer connection mutex poisoned".to_string(),
            }
        })?;
        f(&conn)
    }

    /// Run `f` against a pooled read connection, checking one out (or
    /// opening a new one up to `reader_pool_size`) and returning it to
    /// the pool afterward.
    pub fn with_reader<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let conn = self.checkout_reader::<E>()?;
        let result = f(&conn);
        self.return_reader(conn);
        result
    }

    fn checkout_reader<E>(&self) -> Result<Connection, E>
    where
        E: From<StorageError>,
    {
        let mut pool = self.readers.lock().map_err(|_| {
            StorageError::SqliteError {
                message: "reader pool mutex poisoned".to_string(),
            }
        })?;
        match pool.pop() {
            Some(conn) => Ok(conn),
            None => Self::new_connection(self.path.as_deref()).map_err(E::from),
        }
    }

    fn return_reader(&self, conn: Connection) {
        if let Ok(mut pool) = self.readers.lock() {
            if pool.len() < self.reader_pool_size {
                pool.push(conn);
            }
        }
    }

    /// Force a WAL checkpoint, folding the write-ahead log back into
    /// the main database file.
    pub fn checkpoint(&self) -> Result<(), StorageError> {
        self.with_writer(|conn| {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
                .map_err(|e| StorageError::SqliteError {
                    message: format!("checkpoint: {e}"),
                })
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_migrates() {
        let db = DatabaseManager::open_in_memory().unwrap();
        let version = db.with_reader(|conn| migrations::current_version(conn)).unwrap();
        assert!(version > 0);
    }

    #[test]
    fn reader_pool_reuses_connections() {
        let db = DatabaseManager::open_in_memory().unwrap();
        db.with_reader(|_| Ok(())).unwrap();
        db.with_reader(|_| Ok(())).unwrap();
        let pool_len = db.readers.lock().unwrap().len();
        assert_eq!(pool_len, 1);
    }
}
