//! External worker adapter: for heavyweight analyzers executed
//! out-of-process. Grounded on `std::process::Command` plus the
//! teacher's `std::thread`-based concurrency idiom — no async runtime
//! anywhere in this workspace (`trajectory-storage::batch::writer`
//! spawns its writer thread the same way).

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::config::ExternalWorkerConfig;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::traits::Analyzer;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::task::{AnalyzerMode, ProgressSnapshot};
use trajectory_storage::TrajectoryStorageEngine;

use crate::lifecycle::TaskLifecycleManager;

#[cfg(test)]
const NAME: &str = "external_worker";

/// Runs a named analyzer as a child process: the worker itself owns
/// the task row as its progress channel; the adapter does not proxy
/// I/O into it, it only spawns, waits, and interprets the exit code —
/// except on failure, where the worker's combined stdout/stderr is
/// captured into the task's error detail, since the worker's own task
/// row updates stop once it has already crashed.
pub struct ExternalWorkerAnalyzer {
    name: String,
    config: ExternalWorkerConfig,
    lifecycle: Arc<TaskLifecycleManager>,
}

/// Drains a child's output pipe into a shared buffer on its own
/// thread, so the caller can keep polling `try_wait`/cancellation
/// without blocking on a full pipe.
fn spawn_reader(mut pipe: impl Read + Send + 'static, buf: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut chunk = Vec::new();
        if pipe.read_to_end(&mut chunk).is_ok() {
            buf.lock().unwrap().extend(chunk);
        }
    })
}

fn combined_output(stdout: &Arc<Mutex<Vec<u8>>>, stderr: &Arc<Mutex<Vec<u8>>>) -> String {
    let out = String::from_utf8_lossy(&stdout.lock().unwrap()).into_owned();
    let err = String::from_utf8_lossy(&stderr.lock().unwrap()).into_owned();
    match (out.trim().is_empty(), err.trim().is_empty()) {
        (true, true) => String::new(),
        (false, true) => out,
        (true, false) => err,
        (false, false) => format!("{out}\n{err}"),
    }
}

impl ExternalWorkerAnalyzer {
    pub fn new(
        name: impl Into<String>,
        config: ExternalWorkerConfig,
        _storage: Arc<TrajectoryStorageEngine>,
        lifecycle: Arc<TaskLifecycleManager>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            lifecycle,
        }
    }
}

impl Analyzer for ExternalWorkerAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        task_id: TaskId,
        _mode: AnalyzerMode,
        cancel: &CancellationToken,
    ) -> Result<(), AnalysisError> {
        let binary = self.config.effective_binary_path();
        let db_path = self.config.effective_database_path();
        let timeout = Duration::from_secs(self.config.effective_timeout_s());

        let mut child = Command::new(&binary)
            .arg(&db_path)
            .arg(task_id.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AnalysisError::WorkerFailed {
                detail: format!("failed to spawn worker '{binary}': {e}"),
            })?;

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let stdout_thread = spawn_reader(child.stdout.take().expect("piped stdout"), stdout_buf.clone());
        let stderr_thread = spawn_reader(child.stderr.take().expect("piped stderr"), stderr_buf.clone());

        let started = Instant::now();
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| AnalysisError::WorkerFailed { detail: e.to_string() })?
            {
                let _ = stdout_thread.join();
                let _ = stderr_thread.join();
                if status.success() {
                    // The worker transitioned its own task row to a
                    // terminal state.
                    return Ok(());
                }
                let output = combined_output(&stdout_buf, &stderr_buf);
                let detail = if output.is_empty() {
                    format!("worker exited with {status}")
                } else {
                    format!("worker exited with {status}:\n{output}")
                };
                return Err(AnalysisError::WorkerFailed { detail });
            }

            if cancel.is_cancelled() {
                // Best-effort: signal termination, partial derived rows
                // already written by the worker persist as-is.
                let _ = child.kill();
                let _ = child.wait();
                return Err(AnalysisError::Cancelled);
            }

            if started.elapsed() > timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AnalysisError::WorkerFailed {
                    detail: format!("worker exceeded timeout of {}s", timeout.as_secs()),
                });
            }

            std::thread::sleep(Duration::from_millis(200));
        }
    }

    fn progress(&self, task_id: TaskId) -> Option<ProgressSnapshot> {
        let task = self.lifecycle.get(task_id).ok()?;
        Some(ProgressSnapshot::compute(
            task.processed_points,
            task.total_points,
            task.failed_points,
            0.0,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(config: ExternalWorkerConfig) -> ExternalWorkerAnalyzer {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        ExternalWorkerAnalyzer::new(NAME, config, storage, lifecycle)
    }

    #[test]
    fn failed_worker_surfaces_combined_output_in_detail() {
        // The adapter invokes `<binary> <db_path> <task_id>`; with
        // `sh`, `db_path` becomes the `-c` script and `task_id` lands
        // in `$0`, which the script below ignores.
        let config = ExternalWorkerConfig {
            binary_path: Some("sh".to_string()),
            database_path: Some("echo out-line; echo err-line >&2; exit 3".to_string()),
            timeout_s: Some(5),
        };
        let a = analyzer(config);
        let err = a
            .execute(TaskId::from(1), AnalyzerMode::Full, &CancellationToken::new())
            .unwrap_err();
        match err {
            AnalysisError::WorkerFailed { detail } => {
                assert!(detail.contains("out-line"), "detail missing stdout: {detail}");
                assert!(detail.contains("err-line"), "detail missing stderr: {detail}");
            }
            other => panic!("expected WorkerFailed, got {other:?}"),
        }
    }
}
