//! Geographic coordinates.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
///
/// Coordinates are never rejected at construction; validity is checked where
/// it matters (distance estimation treats an invalid coordinate as
/// unreachable).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180].
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// `lat,lon` as used in distance cache keys.
    ///
    /// Whole numbers keep their `.0` and tiny magnitudes use a two-digit
    /// exponent, so keys match cache files written by the earlier tooling.
    pub fn key(&self) -> String {
        format!("{},{}", key_float(self.lat), key_float(self.lon))
    }
}

/// Shortest round-tripping text for `value`, `-22.0` rather than `-22`.
fn key_float(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value != 0.0 && value.abs() < 1e-4 {
        let text = format!("{value:e}");
        return match text.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exp),
                };
                format!("{mantissa}e{sign}{digits:0>2}")
            }
            None => text,
        };
    }
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ranges_are_inclusive() {
        assert!(Coordinate::new(90.0, 180.0).is_valid());
        assert!(Coordinate::new(-90.0, -180.0).is_valid());
        assert!(Coordinate::new(-22.188655, -48.615678).is_valid());
    }

    #[test]
    fn test_out_of_range_is_invalid() {
        assert!(!Coordinate::new(90.1, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_key_format() {
        assert_eq!(Coordinate::new(-22.5, -48.25).key(), "-22.5,-48.25");
        assert_eq!(Coordinate::new(-22.188655, -48.615678).key(), "-22.188655,-48.615678");
    }

    #[test]
    fn test_key_keeps_trailing_zero_on_whole_degrees() {
        assert_eq!(Coordinate::new(-22.0, -48.0).key(), "-22.0,-48.0");
        assert_eq!(Coordinate::new(0.0, 10.0).key(), "0.0,10.0");
    }

    #[test]
    fn test_key_uses_two_digit_exponent_for_tiny_values() {
        assert_eq!(Coordinate::new(0.00005, -0.000012).key(), "5e-05,-1.2e-05");
    }
}
