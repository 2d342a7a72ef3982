//! Geometry utilities and spatial lookups.

pub mod index;
pub mod queries;

pub use index::{StopLocator, VehicleLocator};
pub use queries::{
    bearing_between, calculate_bearing, distance_between, haversine_distance, lerp,
    meters_to_degrees, EARTH_RADIUS_M, METERS_PER_DEGREE,
};
