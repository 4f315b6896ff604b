//! Revisit-pattern detection: group stays by their geohash6 cell and
//! summarize how often and how regularly each place is revisited.
//! Fully rebuilt every run, same rationale as
//! [`crate::analyzers::trip_construction`] — a visit's place in the
//! pattern depends on every other visit to the same cell, not on
//! what's new since the last run.

use std::collections::HashMap;
use std::sync::Arc;

use trajectory_core::cancellation::CancellationToken;
use trajectory_core::errors::analysis_error::AnalysisError;
use trajectory_core::numerics::stats::{mean, stddev};
use trajectory_core::traits::Analyzer;
use trajectory_core::types::identifiers::TaskId;
use trajectory_core::types::revisit_pattern::RevisitPattern;
use trajectory_core::types::stay::StaySegment;
use trajectory_core::types::task::{AnalyzerMode, ProgressSnapshot};
use trajectory_storage::batch::BatchCommand;
use trajectory_storage::{queries, TrajectoryStorageEngine};

use crate::lifecycle::TaskLifecycleManager;

pub const NAME: &str = "revisit_pattern";

/// Minimum visits to a cell before it counts as a revisit pattern at
/// all.
const MIN_VISITS: usize = 2;
/// Regularity score at/above which a pattern is "periodic" — visits
/// land close to evenly spaced in time.
const PERIODIC_REGULARITY: f64 = 0.8;
/// Visit count at/above which a cell is eligible to be flagged
/// "periodic" at all, in addition to the regularity threshold.
const PERIODIC_MIN_VISIT_COUNT: i64 = 3;
/// Visit count at/above which a periodic pattern is additionally
/// flagged "habitual" rather than merely periodic.
const HABITUAL_VISIT_COUNT: i64 = 5;

pub struct RevisitPatternAnalyzer {
    storage: Arc<TrajectoryStorageEngine>,
    lifecycle: Arc<TaskLifecycleManager>,
}

impl RevisitPatternAnalyzer {
    pub fn new(storage: Arc<TrajectoryStorageEngine>, lifecycle: Arc<TaskLifecycleManager>) -> Self {
        Self { storage, lifecycle }
    }

    fn rebuild(&self) -> Result<(), AnalysisError> {
        self.storage
            .database()
            .with_writer::<(), AnalysisError>(|conn| {
                conn.execute("DELETE FROM revisit_patterns", [])
                    .map_err(|e| trajectory_core::errors::storage_error::StorageError::SqliteError {
                        message: e.to_string(),
                    })?;
                Ok(())
            })
    }

    /// Build one `RevisitPattern` per geohash6 cell with at least
    /// [`MIN_VISITS`] stays, from all stays regardless of significance
    /// (a revisit pattern can emerge from many short stops, not just
    /// significant ones).
    fn build_patterns(&self, stays: &[StaySegment]) -> Vec<RevisitPattern> {
        let mut by_cell: HashMap<&str, Vec<&StaySegment>> = HashMap::new();
        for stay in stays {
            by_cell.entry(stay.geohash6.as_str()).or_default().push(stay);
        }

        let mut patterns = Vec::new();
        for (geohash6, mut visits) in by_cell {
            if visits.len() < MIN_VISITS {
                continue;
            }
            visits.sort_by_key(|s| s.start_ts);

            let visit_count = visits.len() as i64;
            let first_visit_ts = visits.first().unwrap().start_ts;
            let last_visit_ts = visits.last().unwrap().start_ts;
            let total_duration_s: i64 = visits.iter().map(|s| s.duration_s).sum();
            let center_lat = mean(&visits.iter().map(|s| s.center_lat).collect::<Vec<_>>());
            let center_lon = mean(&visits.iter().map(|s| s.center_lon).collect::<Vec<_>>());

            let intervals: Vec<f64> = visits
                .windows(2)
                .map(|pair| (pair[1].start_ts - pair[0].start_ts) as f64)
                .collect();
            let mean_interval_s = mean(&intervals);
            let stddev_interval_s = stddev(&intervals);
            let regularity_score = if mean_interval_s > 0.0 {
                1.0 / (1.0 + stddev_interval_s / mean_interval_s)
            } else {
                0.0
            };
            let revisit_strength = (1.0 + visit_count as f64).ln() * (1.0 + total_duration_s as f64).ln();

            let mut pattern_flags = Vec::new();
            if regularity_score > PERIODIC_REGULARITY && visit_count >= PERIODIC_MIN_VISIT_COUNT {
                pattern_flags.push("PERIODIC".to_string());
                if visit_count >= HABITUAL_VISIT_COUNT {
                    pattern_flags.push("HABITUAL".to_string());
                }
            }

            patterns.push(RevisitPattern {
                geohash6: geohash6.to_string(),
                center_lat,
                center_lon,
                visit_count,
                first_visit_ts,
                last_visit_ts,
                total_duration_s,
                mean_interval_s,
                stddev_interval_s,
                regularity_score,
                revisit_strength,
                pattern_flags,
            });
        }

        patterns
    }
}

impl Analyzer for RevisitPatternAnalyzer {
    fn name(&self) -> &str {
        NAME
    }

    fn execute(&self, task_id: TaskId, _mode: AnalyzerMode, cancel: &CancellationToken) -> Result<(), AnalysisError> {
        self.rebuild()?;

        let stays = self
            .storage
            .database()
            .with_reader::<_, AnalysisError>(|conn| {
                queries::stays::stays_in_range(conn, i64::MIN, i64::MAX).map_err(AnalysisError::from)
            })?;

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let patterns = self.build_patterns(&stays);
        let pattern_count = patterns.len() as i64;
        if !patterns.is_empty() {
            self.storage.send_batch(BatchCommand::UpsertRevisitPatterns(patterns))?;
        }
        self.storage.flush_batch_sync()?;
        self.lifecycle.report_progress(task_id, pattern_count, 0)?;

        self.lifecycle.complete(
            task_id,
            serde_json::json!({
                "stays_considered": stays.len(),
                "patterns_emitted": pattern_count,
            }),
        )?;
        Ok(())
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
    use trajectory_core::types::track_point::AdminLabels;

    fn stay(start_ts: i64, geohash6: &str) -> StaySegment {
        StaySegment {
            id: 0,
            start_ts,
            end_ts: start_ts + 600,
            duration_s: 600,
            center_lat: 1.0,
            center_lon: 1.0,
            geohash6: geohash6.to_string(),
            admin: AdminLabels::default(),
            stay_type: None,
            reason_codes: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    fn analyzer() -> RevisitPatternAnalyzer {
        let storage = Arc::new(TrajectoryStorageEngine::open_in_memory().unwrap());
        let lifecycle = Arc::new(TaskLifecycleManager::new(storage.clone()));
        RevisitPatternAnalyzer::new(storage, lifecycle)
    }

    #[test]
    fn single_visit_cell_produces_no_pattern() {
        let a = analyzer();
        let stays = vec![stay(0, "abcdef")];
        assert!(a.build_patterns(&stays).is_empty());
    }

    #[test]
    fn evenly_spaced_daily_visits_are_periodic() {
        let a = analyzer();
        let day = 86400;
        let stays: Vec<StaySegment> = (0..7).map(|i| stay(i * day, "abcdef")).collect();
        let patterns = a.build_patterns(&stays);
        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.visit_count, 7);
        assert!(p.regularity_score > 0.99, "regularity was {}", p.regularity_score);
        assert!(p.pattern_flags.contains(&"PERIODIC".to_string()));
        assert!(p.pattern_flags.contains(&"HABITUAL".to_string()));
    }

    #[test]
    fn irregular_visits_are_not_flagged_periodic() {
        let a = analyzer();
        let stays = vec![stay(0, "abcdef"), stay(10, "abcdef"), stay(100_000, "abcdef")];
        let patterns = a.build_patterns(&stays);
        assert_eq!(patterns.len(), 1);
        assert!(!patterns[0].pattern_flags.contains(&"PERIODIC".to_string()));
    }

    #[test]
    fn distinct_cells_produce_distinct_patterns() {
        let a = analyzer();
        let stays = vec![
            stay(0, "aaaaaa"),
            stay(100, "aaaaaa"),
            stay(0, "bbbbbb"),
            stay(200, "bbbbbb"),
        ];
        let patterns = a.build_patterns(&stays);
        assert_eq!(patterns.len(), 2);
    }
}
