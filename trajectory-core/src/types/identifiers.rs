//! Newtype identifiers, following the teacher's `define_id!`-style
//! pattern of wrapping primitive ids rather than passing bare `i64`s
//! through business logic.

use std::fmt;

/// Primary key of an `AnalysisTask` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(v: i64) -> Self {
        TaskId(v)
    }
}
