//! Dedicated writer thread with a bounded `crossbeam-channel`. Batches
//! writes into single transactions for throughput (spec.md §6).

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rusqlite::{params, Connection};
use trajectory_core::errors::StorageError;
use trajectory_core::types::{
    BucketedStatistic, GridCell, RevisitPattern, Segment, SpeedEvent, StaySegment, TrackPoint, Trip,
};

use super::commands::{BatchCommand, QaUpdateRow};

const CHANNEL_BOUND: usize = 1024;
const BATCH_SIZE: usize = 500;
const FLUSH_TIMEOUT: Duration = Duration::from_millis(250);

/// Row counts written since the writer started, returned on shutdown.
#[derive(Debug, Default, Clone)]
pub struct WriteStats {
    pub track_point_rows: usize,
    pub qa_update_rows: usize,
    pub segment_rows: usize,
    pub stay_segment_rows: usize,
    pub trip_rows: usize,
    pub speed_event_rows: usize,
    pub grid_cell_rows: usize,
    pub bucketed_statistic_rows: usize,
    pub revisit_pattern_rows: usize,
    pub flushes: usize,
}

/// A batch writer that accepts commands via a channel and writes them
/// in batched transactions on a dedicated thread.
pub struct BatchWriter {
    tx: Sender<BatchCommand>,
    handle: Option<JoinHandle<Result<WriteStats, StorageError>>>,
}

impl BatchWriter {
    /// Create a new batch writer with a dedicated writer thread. `conn`
    /// is moved to the writer thread and not touched anywhere else.
    pub fn new(conn: Connection) -> Self {
        let (tx, rx) = bounded(CHANNEL_BOUND);

        let handle = thread::Builder::new()
            .name("trajectory-batch-writer".to_string())
            .spawn(move || writer_loop(conn, rx))
            .expect("failed to spawn batch writer thread");

        Self {
            tx,
            handle: Some(handle),
        }
    }

    pub fn send(&self, cmd: BatchCommand) -> Result<(), StorageError> {
        self.tx.send(cmd).map_err(|_| StorageError::SqliteError {
            message: "batch writer channel disconnected".to_string(),
        })
    }

    /// Flush pending writes (fire-and-forget, does NOT wait for completion).
    pub fn flush(&self) -> Result<(), StorageError> {
        self.send(BatchCommand::Flush)
    }

    /// Flush pending writes and **block** until the writer thread
    /// confirms everything buffered has been committed.
    pub fn flush_sync(&self) -> Result<(), StorageError> {
        let (tx, rx) = std::sync::mpsc::sync_channel(0);
        self.send(BatchCommand::FlushSync(tx))?;
        rx.recv().map_err(|_| StorageError::SqliteError {
            message: "batch writer thread did not respond to flush_sync".to_string(),
        })
    }

    /// Shut down the writer thread and wait for completion.
    pub fn shutdown(mut self) -> Result<WriteStats, StorageError> {
        let _ = self.tx.send(BatchCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| StorageError::SqliteError {
                message: "batch writer thread panicked".to_string(),
            })?
        } else {
            Ok(WriteStats::default())
        }
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        let _ = self.tx.send(BatchCommand::Shutdown);
    }
}

fn writer_loop(conn: Connection, rx: Receiver<BatchCommand>) -> Result<WriteStats, StorageError> {
    let mut buffer: Vec<BatchCommand> = Vec::with_capacity(BATCH_SIZE);
    let mut stats = WriteStats::default();

    loop {
        match rx.recv_timeout(FLUSH_TIMEOUT) {
            Ok(BatchCommand::Shutdown) => {
                flush_buffer(&conn, &mut buffer, &mut stats)?;
                break;
            }
            Ok(BatchCommand::Flush) => {
                flush_buffer(&conn, &mut buffer, &mut stats)?;
            }
            Ok(BatchCommand::FlushSync(done_tx)) => {
                flush_buffer(&conn, &mut buffer, &mut stats)?;
                let _ = done_tx.send(());
            }
            Ok(cmd) => {
                buffer.push(cmd);
                if buffer.len() >= BATCH_SIZE {
                    flush_buffer(&conn, &mut buffer, &mut stats)?;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !buffer.is_empty() {
                    flush_buffer(&conn, &mut buffer, &mut stats)?;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                flush_buffer(&conn, &mut buffer, &mut stats)?;
                break;
            }
        }
    }

    Ok(stats)
}

fn flush_buffer(
    conn: &Connection,
    buffer: &mut Vec<BatchCommand>,
    stats: &mut WriteStats,
) -> Result<(), StorageError> {
    if buffer.is_empty() {
        return Ok(());
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| StorageError::SqliteError {
            message: format!("begin transaction: {e}"),
        })?;

    // Track this batch's counts separately, applying to `stats` only
    // after commit succeeds. If any statement fails, `tx` drops without
    // committing and the buffer keeps every command for the next pass.
    let mut batch_stats = WriteStats::default();

    for cmd in buffer.iter() {
        match cmd {
            BatchCommand::InsertTrackPoints(rows) => {
                insert_track_points(&tx, rows)?;
                batch_stats.track_point_rows += rows.len();
            }
            BatchCommand::UpdateTrackPointQa(rows) => {
                update_track_point_qa(&tx, rows)?;
                batch_stats.qa_update_rows += rows.len();
            }
            BatchCommand::InsertSegments(rows) => {
                insert_segments(&tx, rows)?;
                batch_stats.segment_rows += rows.len();
            }
            BatchCommand::InsertStaySegments(rows) => {
                insert_stay_segments(&tx, rows)?;
                batch_stats.stay_segment_rows += rows.len();
            }
            BatchCommand::InsertTrips(rows) => {
                insert_trips(&tx, rows)?;
                batch_stats.trip_rows += rows.len();
            }
            BatchCommand::InsertSpeedEvents(rows) => {
                insert_speed_events(&tx, rows)?;
                batch_stats.speed_event_rows += rows.len();
            }
            BatchCommand::UpsertGridCells(rows) => {
                upsert_grid_cells(&tx, rows)?;
                batch_stats.grid_cell_rows += rows.len();
            }
            BatchCommand::UpsertBucketedStatistics(rows) => {
                upsert_bucketed_statistics(&tx, rows)?;
                batch_stats.bucketed_statistic_rows += rows.len();
            }
            BatchCommand::UpsertRevisitPatterns(rows) => {
                upsert_revisit_patterns(&tx, rows)?;
                batch_stats.revisit_pattern_rows += rows.len();
            }
            BatchCommand::Flush | BatchCommand::FlushSync(_) | BatchCommand::Shutdown => {
                unreachable!("flush/shutdown commands are handled before buffering")
            }
        }
    }

    tx.commit().map_err(|e| StorageError::SqliteError {
        message: format!("commit batch: {e}"),
    })?;

    stats.track_point_rows += batch_stats.track_point_rows;
    stats.qa_update_rows += batch_stats.qa_update_rows;
    stats.segment_rows += batch_stats.segment_rows;
    stats.stay_segment_rows += batch_stats.stay_segment_rows;
    stats.trip_rows += batch_stats.trip_rows;
    stats.speed_event_rows += batch_stats.speed_event_rows;
    stats.grid_cell_rows += batch_stats.grid_cell_rows;
    stats.bucketed_statistic_rows += batch_stats.bucketed_statistic_rows;
    stats.revisit_pattern_rows += batch_stats.revisit_pattern_rows;
    stats.flushes += 1;

    buffer.clear();
    Ok(())
}

fn insert_track_points(conn: &Connection, rows: &[TrackPoint]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO track_points
             (id, ts, lat, lon, altitude, speed, heading, accuracy,
              admin_province, admin_city, admin_county, admin_town,
              grid_id, outlier_flag, outlier_reason_codes, qa_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    for row in rows {
        let reason_codes = serde_json::to_string(&row.outlier_reason_codes)
            .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        stmt.execute(params![
            row.id,
            row.ts,
            row.lat,
            row.lon,
            row.altitude,
            row.speed,
            row.heading,
            row.accuracy,
            row.admin.province,
            row.admin.city,
            row.admin.county,
            row.admin.town,
            row.grid_id,
            row.outlier_flag,
            reason_codes,
            row.qa_status.as_str(),
        ])
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    }
    Ok(())
}

fn update_track_point_qa(conn: &Connection, rows: &[QaUpdateRow]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "UPDATE track_points
             SET outlier_flag = ?2, outlier_reason_codes = ?3, qa_status = ?4
             WHERE id = ?1",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    for row in rows {
        let reason_codes = serde_json::to_string(&row.outlier_reason_codes)
            .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        stmt.execute(params![
            row.point_id,
            row.outlier_flag,
            reason_codes,
            row.qa_status,
        ])
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    }
    Ok(())
}

fn insert_segments(conn: &Connection, rows: &[Segment]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO segments
             (id, mode, start_ts, end_ts, start_point_id, end_point_id,
              point_count, distance_m, duration_s, avg_speed_kmh,
              max_speed_kmh, confidence, reason_codes, metadata, algorithm_version)
             VALUES (NULLIF(?1, 0), ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    for row in rows {
        let reason_codes = serde_json::to_string(&row.reason_codes)
            .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        stmt.execute(params![
            row.id,
            row.mode.as_str(),
            row.start_ts,
            row.end_ts,
            row.start_point_id,
            row.end_point_id,
            row.point_count,
            row.distance_m,
            row.duration_s,
            row.avg_speed_kmh,
            row.max_speed_kmh,
            row.confidence,
            reason_codes,
            row.metadata.to_string(),
            row.algorithm_version,
        ])
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    }
    Ok(())
}

fn insert_stay_segments(conn: &Connection, rows: &[StaySegment]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO stay_segments
             (id, start_ts, end_ts, duration_s, center_lat, center_lon, geohash6,
              admin_province, admin_city, admin_county, admin_town,
              stay_type, reason_codes, metadata)
             VALUES (NULLIF(?1, 0), ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    for row in rows {
        let reason_codes = serde_json::to_string(&row.reason_codes)
            .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        stmt.execute(params![
            row.id,
            row.start_ts,
            row.end_ts,
            row.duration_s,
            row.center_lat,
            row.center_lon,
            row.geohash6,
            row.admin.province,
            row.admin.city,
            row.admin.county,
            row.admin.town,
            row.stay_type,
            reason_codes,
            row.metadata.to_string(),
        ])
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    }
    Ok(())
}

fn insert_trips(conn: &Connection, rows: &[Trip]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO trips
             (id, date_bucket, sequence_number, start_ts, end_ts,
              origin_stay_id, destination_stay_id, modes, total_distance_m,
              duration_s, segment_count, stay_count, purpose, confidence)
             VALUES (NULLIF(?1, 0), ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    for row in rows {
        let modes = serde_json::to_string(&row.modes)
            .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        stmt.execute(params![
            row.id,
            row.date_bucket,
            row.sequence_number,
            row.start_ts,
            row.end_ts,
            row.origin_stay_id,
            row.destination_stay_id,
            modes,
            row.total_distance_m,
            row.duration_s,
            row.segment_count,
            row.stay_count,
            row.purpose.as_str(),
            row.confidence,
        ])
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    }
    Ok(())
}

fn insert_speed_events(conn: &Connection, rows: &[SpeedEvent]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO speed_events
             (id, segment_id, start_ts, end_ts, peak_ts, peak_lat, peak_lon,
              max_speed_mps, avg_speed_mps, admin_province, admin_city,
              admin_county, admin_town, confidence, reason_codes)
             VALUES (NULLIF(?1, 0), ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    for row in rows {
        let reason_codes = serde_json::to_string(&row.reason_codes)
            .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        stmt.execute(params![
            row.id,
            row.segment_id,
            row.start_ts,
            row.end_ts,
            row.peak_ts,
            row.peak_lat,
            row.peak_lon,
            row.max_speed_mps,
            row.avg_speed_mps,
            row.admin.province,
            row.admin.city,
            row.admin.county,
            row.admin.town,
            row.confidence,
            reason_codes,
        ])
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    }
    Ok(())
}

fn upsert_grid_cells(conn: &Connection, rows: &[GridCell]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO grid_cells
             (grid_id, center_lat, center_lon, visit_count, total_duration_s,
              first_visit_ts, last_visit_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    for row in rows {
        stmt.execute(params![
            row.grid_id,
            row.center_lat,
            row.center_lon,
            row.visit_count,
            row.total_duration_s,
            row.first_visit_ts,
            row.last_visit_ts,
        ])
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    }
    Ok(())
}

fn upsert_bucketed_statistics(
    conn: &Connection,
    rows: &[(trajectory_core::types::BucketKey, BucketedStatistic)],
) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO bucketed_statistics
             (metric, bucket_type, bucket_key, area_type, area_key, mode_filter,
              count, sum, max, min, visit_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    for (key, stat) in rows {
        let visit_days = serde_json::to_string(&stat.visit_days)
            .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        stmt.execute(params![
            key.metric,
            key.bucket_type.as_str(),
            key.bucket_key,
            key.area_type.as_str(),
            key.area_key,
            key.mode_filter.as_deref().unwrap_or(""),
            stat.count,
            stat.sum,
            stat.max,
            stat.min,
            visit_days,
        ])
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    }
    Ok(())
}

fn upsert_revisit_patterns(conn: &Connection, rows: &[RevisitPattern]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO revisit_patterns
             (geohash6, center_lat, center_lon, visit_count, first_visit_ts, last_visit_ts,
              total_duration_s, mean_interval_s, stddev_interval_s, regularity_score,
              revisit_strength, pattern_flags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;

    for row in rows {
        let pattern_flags = serde_json::to_string(&row.pattern_flags)
            .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
        stmt.execute(params![
            row.geohash6,
            row.center_lat,
            row.center_lon,
            row.visit_count,
            row.first_visit_ts,
            row.last_visit_ts,
            row.total_duration_s,
            row.mean_interval_s,
            row.stddev_interval_s,
            row.regularity_score,
            row.revisit_strength,
            pattern_flags,
        ])
        .map_err(|e| StorageError::SqliteError { message: e.to_string() })?;
    }
    Ok(())
}
