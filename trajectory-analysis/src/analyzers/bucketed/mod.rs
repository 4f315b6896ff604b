//! The bucketed-statistics family: five analyzers sharing one table and
//! one aggregation shape (see [`aggregator::BucketAggregator`]), each
//! scoped to a different input and area dimension.

pub mod admin_view_engine;
pub mod aggregator;
pub mod directional_bias;
pub mod footprint_statistics;
pub mod speed_space_coupling;
pub mod stay_statistics;
