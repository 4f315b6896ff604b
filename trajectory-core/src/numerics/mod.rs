//! Shared numeric routines used across analyzers: scalar statistics,
//! circular (angular) statistics, great-circle distance, geohashing,
//! and polyline simplification. Kept dependency-free and pure so every
//! analyzer and storage-layer caller can use them without pulling in
//! `rusqlite` or any I/O concern.

pub mod circular;
pub mod douglas_peucker;
pub mod geohash;
pub mod haversine;
pub mod stats;

pub use circular::{circular_mean_degrees, circular_stddev_degrees};
pub use douglas_peucker::simplify as simplify_polyline;
pub use geohash::{decode_center as geohash_decode_center, encode as geohash_encode};
pub use haversine::{haversine_distance_m, polyline_distance_m};
pub use stats::{mean, median, percentile, stddev};
