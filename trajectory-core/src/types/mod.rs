//! Domain types shared by `trajectory-analysis` and `trajectory-storage`.

pub mod bucketed_statistic;
pub mod collections;
pub mod grid_cell;
pub mod identifiers;
pub mod revisit_pattern;
pub mod segment;
pub mod speed_event;
pub mod stay;
pub mod task;
pub mod track_point;
pub mod trip;

pub use bucketed_statistic::{AreaType, BucketKey, BucketType, BucketedStatistic};
pub use grid_cell::GridCell;
pub use identifiers::TaskId;
pub use revisit_pattern::RevisitPattern;
pub use segment::{Segment, TransportMode};
pub use speed_event::SpeedEvent;
pub use stay::StaySegment;
pub use task::{AnalysisTask, AnalyzerMode, ProgressSnapshot, TaskStatus, TaskType};
pub use track_point::{AdminLabels, QaStatus, TrackPoint};
pub use trip::{Trip, TripPurpose};
