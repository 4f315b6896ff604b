//! Mean/stddev/percentile — the scalar half of the numerics kit
//! (spec.md §2 row 1). Modeled on the teacher's MAD/median routines in
//! `patterns/outliers/mad.rs`, generalized to the broader set of
//! summary statistics bucketed analyzers need.

/// Arithmetic mean. Returns 0.0 for an empty slice (callers check
/// `is_empty()` first when that distinction matters).
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation via Welford's single-pass algorithm —
/// numerically stable for the streaming, batch-at-a-time inputs the
/// analyzer base processes (spec.md §5).
pub fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mut mean = 0.0;
    let mut m2 = 0.0;
    let mut n = 0u64;
    for &x in values {
        n += 1;
        let delta = x - mean;
        mean += delta / n as f64;
        let delta2 = x - mean;
        m2 += delta * delta2;
    }
    (m2 / n as f64).sqrt()
}

/// Nearest-rank percentile (0.0..=100.0). `p = 50.0` is the median.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn mean_basic() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn stddev_constant_series_is_zero() {
        assert_eq!(stddev(&[5.0; 10]), 0.0);
    }

    #[test]
    fn percentile_median_odd() {
        assert_eq!(median(&[1.0, 3.0, 2.0]), 2.0);
    }

    #[test]
    fn percentile_bounds() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
    }
}
