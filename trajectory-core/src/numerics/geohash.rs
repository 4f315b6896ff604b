//! Base-32 geohash encoding (spec.md GLOSSARY: "precision controls cell
//! size: 4: ~20km; 6: ~1.2km; 7: ~150m"). Used by stay construction
//! (precision 6) and the grid-cell hierarchy (precisions 4..7).

const BASE32: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Encode `(lat, lon)` to a geohash string of the given precision
/// (number of base-32 characters).
pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
    let mut lat_range = (-90.0, 90.0);
    let mut lon_range = (-180.0, 180.0);
    let mut is_even = true;
    let mut bit = 0u8;
    let mut ch = 0u8;
    let mut out = String::with_capacity(precision);

    while out.len() < precision {
        if is_even {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                ch |= 1 << (4 - bit);
                lon_range.0 = mid;
            } else {
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                ch |= 1 << (4 - bit);
                lat_range.0 = mid;
            } else {
                lat_range.1 = mid;
            }
        }
        is_even = !is_even;

        if bit < 4 {
            bit += 1;
        } else {
            out.push(BASE32[ch as usize] as char);
            bit = 0;
            ch = 0;
        }
    }

    out
}

/// Decode a geohash to its cell's center `(lat, lon)`.
pub fn decode_center(hash: &str) -> (f64, f64) {
    let mut lat_range = (-90.0, 90.0);
    let mut lon_range = (-180.0, 180.0);
    let mut is_even = true;

    for c in hash.chars() {
        let idx = match BASE32.iter().position(|&b| b as char == c) {
            Some(i) => i as u8,
            None => continue,
        };
        for shift in (0..5).rev() {
            let bit = (idx >> shift) & 1;
            if is_even {
                let mid = (lon_range.0 + lon_range.1) / 2.0;
                if bit == 1 {
                    lon_range.0 = mid;
                } else {
                    lon_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if bit == 1 {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            is_even = !is_even;
        }
    }

    (
        (lat_range.0 + lat_range.1) / 2.0,
        (lon_range.0 + lon_range.1) / 2.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_geohash() {
        // Point near Beijing; precision 6 cell is ~1.2km.
        let hash = encode(39.9042, 116.4074, 6);
        assert_eq!(hash.len(), 6);
    }

    #[test]
    fn deterministic_for_fixed_point(){
        let a = encode(37.7749, -122.4194, 7);
        let b = encode(37.7749, -122.4194, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn decode_round_trips_approximately() {
        let (lat, lon) = (35.6762, 139.6503);
        let hash = encode(lat, lon, 7);
        let (dlat, dlon) = decode_center(&hash);
        assert!((dlat - lat).abs() < 0.01);
        assert!((dlon - lon).abs() < 0.01);
    }

    #[test]
    fn precision_increases_specificity() {
        let coarse = encode(10.0, 10.0, 4);
        let fine = encode(10.0, 10.0, 7);
        assert!(fine.starts_with(&coarse));
    }
}
