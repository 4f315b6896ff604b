//! `analysis_tasks` table queries — backs `TaskStore` (spec.md §4.3).

use rusqlite::{params, Connection, OptionalExtension, Row};
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::task::{AnalysisTask, TaskStatus, TaskType};

fn row_to_task(row: &Row) -> rusqlite::Result<AnalysisTask> {
    let status_str: String = row.get(3)?;
    let task_type_str: String = row.get(2)?;
    let result_summary_json: Option<String> = row.get(9)?;
    let parameters_json: String = row.get(14)?;

    Ok(AnalysisTask {
        id: TaskId(row.get(0)?),
        analyzer_name: row.get(1)?,
        task_type: task_type_str.parse().unwrap_or(TaskType::Incremental),
        status: status_str.parse().unwrap_or(TaskStatus::Pending),
        total_points: row.get(4)?,
        processed_points: row.get(5)?,
        failed_points: row.get(6)?,
        progress_percent: row.get(7)?,
        result_summary: result_summary_json
            .and_then(|s| serde_json::from_str(&s).ok()),
        error_message: row.get(10)?,
        created_at: row.get(11)?,
        started_at: row.get(12)?,
        completed_at: row.get(13)?,
        updated_at: row.get(8)?,
        parameters: serde_json::from_str(&parameters_json).unwrap_or(serde_json::Value::Null),
    })
}

const SELECT_COLUMNS: &str = "id, analyzer_name, task_type, status, total_points,
     processed_points, failed_points, progress_percent, updated_at,
     result_summary, error_message, created_at, started_at, completed_at, parameters";

pub fn create_task(
    conn: &Connection,
    analyzer_name: &str,
    task_type: TaskType,
    parameters: serde_json::Value,
    now: i64,
) -> Result<AnalysisTask, AnalysisError> {
    conn.execute(
        "INSERT INTO analysis_tasks
         (analyzer_name, task_type, status, created_at, updated_at, parameters)
         VALUES (?1, ?2, 'pending', ?3, ?3, ?4)",
        params![analyzer_name, task_type.as_str(), now, parameters.to_string()],
    )
    .map_err(sqlite_err)?;

    let id = conn.last_insert_rowid();
    get_task(conn, TaskId(id))
}

pub fn get_task(conn: &Connection, task_id: TaskId) -> Result<AnalysisTask, AnalysisError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM analysis_tasks WHERE id = ?1");
    conn.query_row(&sql, params![task_id.0], row_to_task)
        .optional()
        .map_err(sqlite_err)?
        .ok_or(AnalysisError::TaskNotFound { task_id: task_id.0 })
}

pub fn list_tasks(
    conn: &Connection,
    analyzer_name: Option<&str>,
) -> Result<Vec<AnalysisTask>, AnalysisError> {
    let sql = match analyzer_name {
        Some(_) => format!(
            "SELECT {SELECT_COLUMNS} FROM analysis_tasks WHERE analyzer_name = ?1 ORDER BY id"
        ),
        None => format!("SELECT {SELECT_COLUMNS} FROM analysis_tasks ORDER BY id"),
    };
    let mut stmt = conn.prepare_cached(&sql).map_err(sqlite_err)?;

    let rows = match analyzer_name {
        Some(name) => stmt.query_map(params![name], row_to_task).map_err(sqlite_err)?,
        None => stmt.query_map([], row_to_task).map_err(sqlite_err)?,
    };

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sqlite_err)?);
    }
    Ok(out)
}

pub fn transition(
    conn: &Connection,
    task_id: TaskId,
    next: TaskStatus,
    now: i64,
) -> Result<(), AnalysisError> {
    let task = get_task(conn, task_id)?;
    if !task.status.can_transition_to(next) {
        return Err(AnalysisError::InvalidTaskState {
            task_id: task_id.0,
            actual: task.status.as_str().to_string(),
            expected: format!("a state that can transition to {}", next.as_str()),
        });
    }

    let started_at_clause = if next == TaskStatus::Running {
        ", started_at = COALESCE(started_at, ?3)"
    } else {
        ""
    };
    let sql = format!(
        "UPDATE analysis_tasks SET status = ?1, updated_at = ?3{started_at_clause} WHERE id = ?2"
    );
    conn.execute(&sql, params![next.as_str(), task_id.0, now])
        .map_err(sqlite_err)?;
    Ok(())
}

pub fn record_progress(
    conn: &Connection,
    task_id: TaskId,
    processed: i64,
    failed: i64,
    now: i64,
) -> Result<(), AnalysisError> {
    let task = get_task(conn, task_id)?;
    let total = task.total_points.max(processed + failed);
    let percent = if total > 0 {
        ((processed + failed) as f64 / total as f64 * 100.0).min(100.0)
    } else {
        100.0
    };

    // Monotonic: never move progress backward under a stale retry.
    conn.execute(
        "UPDATE analysis_tasks
         SET processed_points = MAX(processed_points, ?2),
             failed_points = MAX(failed_points, ?3),
             total_points = ?4,
             progress_percent = MAX(progress_percent, ?5),
             updated_at = ?6
         WHERE id = ?1",
        params![task_id.0, processed, failed, total, percent, now],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn record_result(
    conn: &Connection,
    task_id: TaskId,
    summary: serde_json::Value,
    now: i64,
) -> Result<(), AnalysisError> {
    conn.execute(
        "UPDATE analysis_tasks
         SET status = 'completed', result_summary = ?2, progress_percent = 100.0,
             completed_at = ?3, updated_at = ?3
         WHERE id = ?1",
        params![task_id.0, summary.to_string(), now],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn record_failure(
    conn: &Connection,
    task_id: TaskId,
    message: &str,
    now: i64,
) -> Result<(), AnalysisError> {
    conn.execute(
        "UPDATE analysis_tasks
         SET status = 'failed', error_message = ?2, completed_at = ?3, updated_at = ?3
         WHERE id = ?1",
        params![task_id.0, message, now],
    )
    .map_err(sqlite_err)?;
    Ok(())
}

fn sqlite_err(e: rusqlite::Error) -> AnalysisError {
    AnalysisError::Storage(trajectory_core::errors::storage_error::StorageError::SqliteError {
        message: e.to_string(),
    })
}
