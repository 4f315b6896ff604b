//! Great-circle distance between two coordinates, used by transport-mode
//! segmentation (distance sum, §4.5.2) and stay/grid center computation.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance in meters between two (lat, lon) points in degrees.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Sum of pairwise Haversine distances across an ordered polyline
/// (§4.5.2: "total distance ... sum of pairwise Haversine distances").
pub fn polyline_distance_m(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance_m(w[0].0, w[0].1, w[1].0, w[1].1))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        assert_eq!(haversine_distance_m(39.9, 116.4, 39.9, 116.4), 0.0);
    }

    #[test]
    fn known_distance_approx() {
        // Roughly 1 degree of latitude ~= 111.2 km.
        let d = haversine_distance_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 1000.0, "d was {d}");
    }

    #[test]
    fn polyline_sums_segments() {
        let points = [(0.0, 0.0), (0.0, 0.001), (0.0, 0.002)];
        let whole = polyline_distance_m(&points);
        let half = haversine_distance_m(0.0, 0.0, 0.0, 0.001) * 2.0;
        assert!((whole - half).abs() < 1e-6);
    }
}
