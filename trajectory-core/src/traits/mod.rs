//! Shared traits used across workspace crates.

pub mod analyzer;
pub mod storage;

pub use analyzer::Analyzer;
pub use storage::{PointReader, TaskStore};
