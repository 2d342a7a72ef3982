//! R-tree lookups for hit testing stops and vehicles on the map.
//!
//! ## Two-Stage Filtering
//!
//! 1. **R-tree filter**: Euclidean distance in degrees for fast approximate filtering
//! 2. **Haversine filter**: accurate geodesic distance on the filtered results
//!
//! The degree radius uses the same sphere as the haversine step and is widened
//! by the longitude shrink factor at the poleward edge of the search circle,
//! so the first stage never drops a point the second would keep.

use geo::Point;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::identifiers::StopIdentifier;
use crate::models::types::VehiclePosition;
use crate::spatial::queries::{distance_between, meters_to_degrees};

// ============================================================================
// Spatial Node
// ============================================================================

/// A point in the tree, pointing back into the caller's list
#[derive(Clone, Copy, Debug)]
pub struct IndexedPoint {
    pub index: usize,
    point: [f64; 2],
}

impl IndexedPoint {
    pub fn new(index: usize, location: Point) -> Self {
        Self {
            index,
            point: [location.x(), location.y()],
        }
    }
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Indices of points within `radius_m` of `point`, nearest first
fn within(
    tree: &RTree<IndexedPoint>,
    locations: impl Fn(usize) -> Point,
    point: Point,
    radius_m: f64,
) -> Vec<(usize, f64)> {
    if radius_m <= 0.0 || !radius_m.is_finite() {
        return Vec::new();
    }

    let lat_radius_deg = meters_to_degrees(radius_m);
    let poleward_lat = (point.y().abs() + lat_radius_deg).min(90.0);
    let lon_scale = poleward_lat.to_radians().cos().max(0.01);
    // Small margin for the planar approximation of the first stage
    let radius_deg = lat_radius_deg / lon_scale * 1.001;

    let mut hits: Vec<(usize, f64)> = tree
        .locate_within_distance([point.x(), point.y()], radius_deg * radius_deg)
        .map(|node| (node.index, distance_between(point, locations(node.index))))
        .filter(|(_, dist)| *dist <= radius_m)
        .collect();
    hits.sort_by(|a, b| a.1.total_cmp(&b.1));
    hits
}

// ============================================================================
// Stops
// ============================================================================

pub struct StopLocator {
    stops: Vec<(StopIdentifier, Point)>,
    tree: RTree<IndexedPoint>,
}

impl StopLocator {
    pub fn new(stops: impl IntoIterator<Item = (StopIdentifier, Point)>) -> Self {
        let stops: Vec<_> = stops.into_iter().collect();
        let tree = RTree::bulk_load(
            stops
                .iter()
                .enumerate()
                .map(|(i, (_, location))| IndexedPoint::new(i, *location))
                .collect(),
        );
        Self { stops, tree }
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Stops within `radius_m` meters, nearest first, with their distance
    pub fn stops_near(&self, point: Point, radius_m: f64) -> Vec<(&StopIdentifier, f64)> {
        within(&self.tree, |i| self.stops[i].1, point, radius_m)
            .into_iter()
            .map(|(i, dist)| (&self.stops[i].0, dist))
            .collect()
    }
}

// ============================================================================
// Vehicles
// ============================================================================

/// Index over one frame of vehicle positions
pub struct VehicleLocator<'a> {
    positions: &'a [VehiclePosition],
    tree: RTree<IndexedPoint>,
}

impl<'a> VehicleLocator<'a> {
    pub fn new(positions: &'a [VehiclePosition]) -> Self {
        let tree = RTree::bulk_load(
            positions
                .iter()
                .enumerate()
                .map(|(i, v)| IndexedPoint::new(i, v.position))
                .collect(),
        );
        Self { positions, tree }
    }

    /// The closest vehicle within `max_distance_m` meters, if any
    pub fn pick(&self, point: Point, max_distance_m: f64) -> Option<&'a VehiclePosition> {
        within(&self.tree, |i| self.positions[i].position, point, max_distance_m)
            .first()
            .map(|(i, _)| &self.positions[*i])
    }
}
