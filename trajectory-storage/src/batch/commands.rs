//! `BatchCommand` — all write operations the batch writer thread
//! accepts, grouped by the table they touch.

use trajectory_core::types::{
    BucketKey, BucketedStatistic, GridCell, RevisitPattern, Segment, SpeedEvent, StaySegment, TrackPoint, Trip,
};

/// A quality-assessment update applied to an already-ingested point
/// (spec.md §4.5.1's outlier detector runs after ingestion, not during
/// it, so flags are written back rather than inserted fresh).
#[derive(Debug, Clone)]
pub struct QaUpdateRow {
    pub point_id: i64,
    pub outlier_flag: bool,
    pub outlier_reason_codes: Vec<String>,
    pub qa_status: String,
}

#[derive(Debug)]
pub enum BatchCommand {
    InsertTrackPoints(Vec<TrackPoint>),
    UpdateTrackPointQa(Vec<QaUpdateRow>),
    InsertSegments(Vec<Segment>),
    InsertStaySegments(Vec<StaySegment>),
    InsertTrips(Vec<Trip>),
    InsertSpeedEvents(Vec<SpeedEvent>),
    UpsertGridCells(Vec<GridCell>),
    UpsertBucketedStatistics(Vec<(BucketKey, BucketedStatistic)>),
    UpsertRevisitPatterns(Vec<RevisitPattern>),
    /// Flush any pending writes immediately (fire-and-forget).
    Flush,
    /// Flush and signal completion via the provided sender (synchronous).
    FlushSync(std::sync::mpsc::SyncSender<()>),
    /// Shut down the writer thread.
    Shutdown,
}
