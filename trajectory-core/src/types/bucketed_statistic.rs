//! `BucketedStatistic` — generic aggregation row (spec.md §3, §4.5.7).
//!
//! Per §9's design note on composite-key aggregation, the identity is a
//! standalone hashable value object (`BucketKey`) rather than four loose
//! scalars threaded through business logic.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketType {
    All,
    Year,
    Month,
    Day,
}

impl BucketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AreaType {
    All,
    Province,
    City,
    County,
    Town,
    Grid,
}

impl AreaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Province => "PROVINCE",
            Self::City => "CITY",
            Self::County => "COUNTY",
            Self::Town => "TOWN",
            Self::Grid => "GRID",
        }
    }
}

/// Composite identity of a `BucketedStatistic` row:
/// `(metric, bucket_type, bucket_key, area_type, area_key, mode_filter?)`.
///
/// `metric` distinguishes which statistic family a row belongs to
/// (`"footprint"`, `"stay_duration"`, `"speed_space_coupling"`, ...) —
/// the representative analyzers in §4.5.7 share one table, so without
/// it two families could collide on the same bucket/area pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub metric: String,
    pub bucket_type: BucketType,
    pub bucket_key: String,
    pub area_type: AreaType,
    pub area_key: String,
    pub mode_filter: Option<String>,
}

/// A single bucketed-statistic row. Numeric payload fields are generic
/// enough to cover the representative family in §4.5.7 (counts, sums,
/// distinct-day sets); individual analyzers interpret the fields they
/// populate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketedStatistic {
    pub count: i64,
    pub sum: f64,
    pub max: f64,
    pub min: f64,
    /// Serialized set of distinct visit-day date strings (`YYYY-MM-DD`),
    /// used to compute distinct-day counts without re-scanning inputs.
    pub visit_days: Vec<String>,
}

impl BucketedStatistic {
    /// Merge another partial statistic into this one. Aggregation fields
    /// are reproducible under re-execution (spec.md §4.5.7), so merging
    /// is commutative and idempotent as long as the same row isn't
    /// merged twice within a single run.
    pub fn merge(&mut self, other: &BucketedStatistic) {
        let had_prior_rows = self.count > 0;
        self.count += other.count;
        self.sum += other.sum;
        self.max = self.max.max(other.max);
        self.min = if had_prior_rows {
            self.min.min(other.min)
        } else {
            other.min
        };
        for day in &other.visit_days {
            if !self.visit_days.iter().any(|d| d == day) {
                self.visit_days.push(day.clone());
            }
        }
    }

    pub fn distinct_days(&self) -> usize {
        self.visit_days.len()
    }
}
