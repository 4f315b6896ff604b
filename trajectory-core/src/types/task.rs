//! `AnalysisTask` — control-plane row (spec.md §3, §4.3).

use serde::{Deserialize, Serialize};

use super::identifiers::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid next states from this state (spec.md §4.3's transition
    /// diagram).
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Pending, Cancelled)
        )
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Incremental,
    FullRecompute,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incremental => "INCREMENTAL",
            Self::FullRecompute => "FULL_RECOMPUTE",
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCREMENTAL" => Ok(Self::Incremental),
            "FULL_RECOMPUTE" => Ok(Self::FullRecompute),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// Execution mode passed to `Analyzer::execute` (spec.md §4.2). A 1:1
/// mirror of `TaskType`, kept distinct because the analyzer contract is
/// defined independently of the task row's persisted representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerMode {
    Incremental,
    Full,
}

impl From<TaskType> for AnalyzerMode {
    fn from(t: TaskType) -> Self {
        match t {
            TaskType::Incremental => AnalyzerMode::Incremental,
            TaskType::FullRecompute => AnalyzerMode::Full,
        }
    }
}

/// The control-plane row owned exclusively by its executing worker
/// (spec.md §3 "Ownership").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub id: TaskId,
    pub analyzer_name: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub total_points: i64,
    pub processed_points: i64,
    pub failed_points: i64,
    pub progress_percent: f64,
    pub result_summary: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
    pub parameters: serde_json::Value,
}

/// Snapshot returned by `Analyzer::progress` (spec.md §4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub processed: i64,
    pub total: i64,
    pub failed: i64,
    pub percent: f64,
    pub eta_seconds: Option<i64>,
}

impl ProgressSnapshot {
    pub fn compute(processed: i64, total: i64, failed: i64, elapsed_secs: f64) -> Self {
        let percent = if total <= 0 {
            100.0
        } else {
            ((processed + failed) as f64 / total as f64 * 100.0).min(100.0)
        };
        let eta_seconds = if processed > 0 && total > processed && elapsed_secs > 0.0 {
            let rate = processed as f64 / elapsed_secs;
            if rate > 0.0 {
                Some(((total - processed) as f64 / rate).round() as i64)
            } else {
                None
            }
        } else {
            None
        };
        Self {
            processed,
            total,
            failed,
            percent,
            eta_seconds,
        }
    }
}
