//! # trajectory-storage
//!
//! SQLite persistence layer for the trajectory analytics engine: WAL
//! mode, a write-serialized + read-pooled connection manager, a batch
//! writer thread for high-volume inserts, and versioned schema
//! migrations.

pub mod batch;
pub mod connection;
pub mod engine;
pub mod migrations;
pub mod queries;

pub use batch::BatchWriter;
pub use connection::DatabaseManager;
pub use engine::TrajectoryStorageEngine;
