//! Shared shape for the bucketed-statistic family (spec.md §4.5.7): scan
//! an input table, fan out each row to its composite `(metric,
//! bucket_type × area_type)` keys, accumulate in a bounded in-memory
//! map, flush once via upsert.
//!
//! Every bucketed analyzer fully rebuilds its slice of the table each
//! run rather than reading-merging-writing against prior state: the
//! `(bucket_type, bucket_key)` axis spans `all`/`year`/`month`/`day`
//! simultaneously for a single input row, so folding a batch into a
//! stale on-disk total would double-count across runs. Accumulating a
//! full pass in memory, then overwriting, keeps it idempotent.

use std::collections::HashMap;

use trajectory_core::types::{AreaType, BucketKey, BucketType, BucketedStatistic};

use crate::calendar;

/// Caps the number of distinct keys tracked in one run (spec.md §5
/// "bounded aggregation map"). A deployment with more distinct
/// area/bucket combinations than this in a single pass drops the
/// longest tail, logged once, rather than growing unbounded.
const MAX_TRACKED_KEYS: usize = 200_000;

pub struct BucketAggregator {
    metric: &'static str,
    map: HashMap<BucketKey, BucketedStatistic>,
    capped: bool,
}

impl BucketAggregator {
    pub fn new(metric: &'static str) -> Self {
        Self {
            metric,
            map: HashMap::new(),
            capped: false,
        }
    }

    /// All four standard bucket granularities for one event timestamp,
    /// at the given area.
    pub fn keys_for(&self, ts: i64, area_type: AreaType, area_key: &str, mode_filter: Option<&str>) -> [BucketKey; 4] {
        [
            self.key(BucketType::All, "all".to_string(), area_type, area_key, mode_filter),
            self.key(BucketType::Year, calendar::year_bucket(ts), area_type, area_key, mode_filter),
            self.key(BucketType::Month, calendar::month_bucket(ts), area_type, area_key, mode_filter),
            self.key(BucketType::Day, calendar::day_bucket(ts), area_type, area_key, mode_filter),
        ]
    }

    fn key(
        &self,
        bucket_type: BucketType,
        bucket_key: String,
        area_type: AreaType,
        area_key: &str,
        mode_filter: Option<&str>,
    ) -> BucketKey {
        BucketKey {
            metric: self.metric.to_string(),
            bucket_type,
            bucket_key,
            area_type,
            area_key: area_key.to_string(),
            mode_filter: mode_filter.map(|m| m.to_string()),
        }
    }

    /// Fold one observation into every key in `keys`. `visit_day`, when
    /// given, is appended to the bucket's distinct-day set.
    pub fn record(&mut self, keys: impl IntoIterator<Item = BucketKey>, value: f64, visit_day: Option<&str>) {
        for key in keys {
            if !self.map.contains_key(&key) && self.map.len() >= MAX_TRACKED_KEYS {
                if !self.capped {
                    tracing::warn!(metric = self.metric, cap = MAX_TRACKED_KEYS, "bucket aggregation map capped; dropping overflow keys");
                    self.capped = true;
                }
                continue;
            }
            let entry = self.map.entry(key).or_default();
            let first = entry.count == 0;
            entry.count += 1;
            entry.sum += value;
            entry.max = if first { value } else { entry.max.max(value) };
            entry.min = if first { value } else { entry.min.min(value) };
            if let Some(day) = visit_day {
                if !entry.visit_days.iter().any(|d| d == day) {
                    entry.visit_days.push(day.to_string());
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn into_rows(self) -> Vec<(BucketKey, BucketedStatistic)> {
        self.map.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_across_all_four_granularities() {
        let mut agg = BucketAggregator::new("test_metric");
        let keys = agg.keys_for(1_623_715_200, AreaType::City, "beijing", None);
        agg.record(keys, 10.0, Some("2021-06-15"));
        let rows = agg.into_rows();
        assert_eq!(rows.len(), 4);
        for (_, stat) in &rows {
            assert_eq!(stat.count, 1);
            assert_eq!(stat.sum, 10.0);
            assert_eq!(stat.distinct_days(), 1);
        }
    }

    #[test]
    fn accumulates_repeated_observations_in_same_bucket() {
        let mut agg = BucketAggregator::new("test_metric");
        let keys = agg.keys_for(1_623_715_200, AreaType::City, "beijing", None);
        agg.record(keys.clone(), 5.0, None);
        agg.record(keys, 15.0, None);
        let rows = agg.into_rows();
        let all_bucket = rows.iter().find(|(k, _)| k.bucket_type == BucketType::All).unwrap();
        assert_eq!(all_bucket.1.count, 2);
        assert_eq!(all_bucket.1.sum, 20.0);
        assert_eq!(all_bucket.1.min, 5.0);
        assert_eq!(all_bucket.1.max, 15.0);
    }
}
