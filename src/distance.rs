// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::f64::consts::PI;

/// Mean radius of Earth, in meters.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
const EARTH_RADIUS: f64 = 6_371_008.8;

/// Mean diameter of Earth, in meters.
const EARTH_DIAMETER: f64 = EARTH_RADIUS + EARTH_RADIUS;

/// Size of the 31-bit tile coordinate space along each axis.
const TILE_31: f64 = (1u64 << 31) as f64;

/// Latitudes beyond this value can't be represented in the Mercator projection.
const MAX_MERCATOR_LATITUDE: f64 = 85.0511;

/// Calculates the great-circle distance between two lat-lon positions
/// on Earth using the `haversine formula <https://en.wikipedia.org/wiki/Haversine_formula>`_.
/// Returns the result in meters.
pub fn earth_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lon1 = lon1.to_radians();
    let lat2 = lat2.to_radians();
    let lon2 = lon2.to_radians();

    let sin_dlat_half = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon_half = ((lon2 - lon1) * 0.5).sin();

    let h = sin_dlat_half * sin_dlat_half + lat1.cos() * lat2.cos() * sin_dlon_half * sin_dlon_half;

    EARTH_DIAMETER * h.sqrt().asin()
}

/// Great-circle distance in meters between two points in 31-bit tile coordinates.
pub fn distance_31(x1: u32, y1: u32, x2: u32, y2: u32) -> f64 {
    if x1 == x2 && y1 == y2 {
        return 0.0;
    }
    earth_distance(
        latitude_from_y31(y1),
        longitude_from_x31(x1),
        latitude_from_y31(y2),
        longitude_from_x31(x2),
    )
}

/// Converts a longitude into the x coordinate of the 31-bit Mercator tile space.
pub fn x31_from_longitude(lon: f64) -> u32 {
    let lon = lon.clamp(-180.0, 179.999_999_9);
    ((lon + 180.0) / 360.0 * TILE_31) as u32
}

/// Converts a latitude into the y coordinate of the 31-bit Mercator tile space.
pub fn y31_from_latitude(lat: f64) -> u32 {
    let lat = lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE).to_radians();
    let eval = (lat.tan() + 1.0 / lat.cos()).ln();
    ((1.0 - eval / PI) / 2.0 * TILE_31) as u32
}

pub fn longitude_from_x31(x: u32) -> f64 {
    x as f64 / TILE_31 * 360.0 - 180.0
}

pub fn latitude_from_y31(y: u32) -> f64 {
    let n = PI - 2.0 * PI * y as f64 / TILE_31;
    n.sinh().atan().to_degrees()
}

/// Rough conversion of a difference of 31-bit x coordinates into meters.
#[inline]
pub fn x31_to_meters(dx: u32) -> f64 {
    dx as f64 * 0.011
}

/// Rough conversion of a difference of 31-bit y coordinates into meters.
#[inline]
pub fn y31_to_meters(dy: u32) -> f64 {
    dy as f64 * 0.01863
}

/// Normalizes an angle (in radians) into the (-π, π] range.
pub fn align_angle_difference(mut diff: f64) -> f64 {
    while diff > PI {
        diff -= 2.0 * PI;
    }
    while diff <= -PI {
        diff += 2.0 * PI;
    }
    diff
}

/// Normalizes an angle (in degrees) into the (-180, 180] range.
pub fn normalized_angle_degrees(mut angle: f64) -> f64 {
    while angle > 180.0 {
        angle -= 360.0;
    }
    while angle <= -180.0 {
        angle += 360.0;
    }
    angle
}

/// Signed difference `a1 - a2` between two bearings (in degrees), normalized into (-180, 180].
pub fn degrees_diff(a1: f64, a2: f64) -> f64 {
    normalized_angle_degrees(a1 - a2)
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr) => {
            assert!(
                (($a - $b).abs() < 1e-4),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    #[test]
    fn earth_distance_between_cities() {
        // Warsaw Palace of Culture and Science to Kraków Main Square
        let d = earth_distance(52.2317, 21.0060, 50.0617, 19.9373);
        assert!((d - 252_000.0).abs() < 1_000.0, "unexpected distance {}", d);
    }

    #[test]
    fn earth_distance_same_point() {
        assert_eq!(earth_distance(10.0, 20.0, 10.0, 20.0), 0.0);
        assert_eq!(distance_31(100, 200, 100, 200), 0.0);
    }

    #[test]
    fn tile_coordinates_round_trip() {
        let x = x31_from_longitude(21.0060);
        let y = y31_from_latitude(52.2317);
        assert!((longitude_from_x31(x) - 21.0060).abs() < 1e-6);
        assert!((latitude_from_y31(y) - 52.2317).abs() < 1e-6);
    }

    #[test]
    fn degrees_diff_wraps() {
        assert_almost_eq!(degrees_diff(10.0, 350.0), 20.0);
        assert_almost_eq!(degrees_diff(350.0, 10.0), -20.0);
        assert_almost_eq!(degrees_diff(90.0, -90.0), 180.0);
        assert_almost_eq!(degrees_diff(-90.0, 90.0), 180.0);
    }

    #[test]
    fn align_angle_difference_range() {
        assert_almost_eq!(align_angle_difference(3.0 * PI), PI);
        assert_almost_eq!(align_angle_difference(-PI), PI);
        assert_almost_eq!(align_angle_difference(0.5), 0.5);
    }
}
