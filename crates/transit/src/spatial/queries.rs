//! Great-circle geometry on raw coordinates.
//!
//! Distances use a spherical Earth of radius 6,371 km. `geo` computes on its
//! mean radius, so its results are rescaled.

use geo::{HaversineBearing, HaversineDistance, Point};

/// `geo`'s mean Earth radius (private in `geo` 0.28; value mirrored from its crate root)
const MEAN_EARTH_RADIUS: f64 = 6371008.8;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude (and of longitude at the equator)
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Great-circle distance in meters between two (lat, lon) pairs in degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let from = Point::new(lon1, lat1);
    let to = Point::new(lon2, lat2);
    from.haversine_distance(&to) * (EARTH_RADIUS_M / MEAN_EARTH_RADIUS)
}

/// Initial bearing from point 1 to point 2, degrees clockwise from north in [0, 360).
///
/// Identical points give 0.
pub fn calculate_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let from = Point::new(lon1, lat1);
    let bearing = from.haversine_bearing(Point::new(lon2, lat2)).rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Haversine distance between two lon/lat points in meters
pub fn distance_between(p1: Point, p2: Point) -> f64 {
    haversine_distance(p1.y(), p1.x(), p2.y(), p2.x())
}

/// Bearing from `from` toward `to`
pub fn bearing_between(from: Point, to: Point) -> f64 {
    calculate_bearing(from.y(), from.x(), to.y(), to.x())
}

/// Linear interpolation in coordinate space; `t` is expected in [0, 1]
pub fn lerp(from: Point, to: Point, t: f64) -> Point {
    Point::new(from.x() + t * (to.x() - from.x()), from.y() + t * (to.y() - from.y()))
}

/// Meters to degrees of latitude on the same sphere as [`haversine_distance`]
pub fn meters_to_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}
