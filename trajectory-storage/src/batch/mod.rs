//! Batched, asynchronous writes to the trajectory database.

pub mod commands;
pub mod writer;

pub use commands::{BatchCommand, QaUpdateRow};
pub use writer::{BatchWriter, WriteStats};
