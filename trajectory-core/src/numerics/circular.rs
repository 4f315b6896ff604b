//! Circular statistics for heading (degrees, 0..360), where an ordinary
//! arithmetic mean is wrong at the wraparound (e.g. mean of 359° and 1°
//! should be 0°, not 180°). Used by revisit-pattern-style analyzers that
//! might summarize directional tendency from `TrackPoint::heading`.

/// Circular mean of a set of headings in degrees, via the standard
/// sum-of-unit-vectors construction. Returns `None` for an empty slice.
pub fn circular_mean_degrees(headings: &[f64]) -> Option<f64> {
    if headings.is_empty() {
        return None;
    }
    let (sin_sum, cos_sum) = headings.iter().fold((0.0, 0.0), |(s, c), &h| {
        let rad = h.to_radians();
        (s + rad.sin(), c + rad.cos())
    });
    let mean_rad = sin_sum.atan2(cos_sum);
    let mean_deg = mean_rad.to_degrees();
    Some(if mean_deg < 0.0 {
        mean_deg + 360.0
    } else {
        mean_deg
    })
}

/// Circular standard deviation in degrees (0 = perfectly consistent
/// heading, larger = more scattered).
pub fn circular_stddev_degrees(headings: &[f64]) -> Option<f64> {
    if headings.is_empty() {
        return None;
    }
    let n = headings.len() as f64;
    let (sin_sum, cos_sum) = headings.iter().fold((0.0, 0.0), |(s, c), &h| {
        let rad = h.to_radians();
        (s + rad.sin(), c + rad.cos())
    });
    let r = ((sin_sum / n).powi(2) + (cos_sum / n).powi(2)).sqrt();
    Some((-2.0 * r.ln()).max(0.0).sqrt().to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_around_zero() {
        let mean = circular_mean_degrees(&[359.0, 1.0]).unwrap();
        assert!(mean < 1.0 || mean > 359.0, "mean was {mean}");
    }

    #[test]
    fn empty_is_none() {
        assert_eq!(circular_mean_degrees(&[]), None);
    }

    #[test]
    fn consistent_heading_has_low_stddev() {
        let stddev = circular_stddev_degrees(&[90.0, 91.0, 89.0, 90.0]).unwrap();
        assert!(stddev < 5.0);
    }
}
