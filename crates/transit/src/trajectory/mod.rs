//! Precomputed per-trip trajectories.
//!
//! A trajectory is the ordered list of stop-to-stop legs of one trip, each
//! leg carrying its timing and the piece of route geometry it follows. Shapes
//! are processed once and shared by every trip that uses them.

pub mod interpolate;
pub mod precompute;
pub mod shape;
pub mod snap;

use std::collections::HashMap;
use std::sync::Arc;

use geo::{Coord, LineString, Point};

use crate::identifiers::*;

pub use interpolate::{interpolate_on_trajectory, InterpolationResult};
pub use precompute::precompute_trajectories;
pub use shape::{group_shapes, process_shape};
pub use snap::{linear_segments, map_stops_to_shape_segments, TimedStop};

// ============================================================================
// Shape points
// ============================================================================

/// A point along a route geometry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapePoint {
    /// x = longitude, y = latitude
    pub location: Point,
    /// Meters from the first point of the shape
    pub distance_from_start: f64,
    /// Degrees toward the next point; the last point repeats the previous bearing
    pub bearing: f64,
}

impl ShapePoint {
    pub fn lon(&self) -> f64 {
        self.location.x()
    }

    pub fn lat(&self) -> f64 {
        self.location.y()
    }
}

/// A window `[start, end]` (inclusive, at least two points) into a shared shape.
///
/// Distances stay relative to the whole shape; `relative_distance` renormalizes
/// them to the start of the window.
#[derive(Clone, Debug)]
pub struct ShapeSlice {
    shape: Arc<[ShapePoint]>,
    start: usize,
    end: usize,
}

impl ShapeSlice {
    /// `None` unless `start < end < shape.len()`
    pub fn new(shape: Arc<[ShapePoint]>, start: usize, end: usize) -> Option<Self> {
        if start < end && end < shape.len() {
            Some(Self { shape, start, end })
        } else {
            None
        }
    }

    pub fn points(&self) -> &[ShapePoint] {
        &self.shape[self.start..=self.end]
    }

    pub fn base_distance(&self) -> f64 {
        self.shape[self.start].distance_from_start
    }

    pub fn relative_distance(&self, point: &ShapePoint) -> f64 {
        point.distance_from_start - self.base_distance()
    }

    pub fn length(&self) -> f64 {
        self.shape[self.end].distance_from_start - self.base_distance()
    }

    /// Copy of the window with distances starting at 0
    pub fn renormalized(&self) -> Vec<ShapePoint> {
        let base = self.base_distance();
        self.points()
            .iter()
            .map(|pt| ShapePoint {
                distance_from_start: pt.distance_from_start - base,
                ..*pt
            })
            .collect()
    }

    pub fn shares_shape(&self, shape: &Arc<[ShapePoint]>) -> bool {
        Arc::ptr_eq(&self.shape, shape)
    }
}

// ============================================================================
// Segments
// ============================================================================

/// How a leg is drawn between its two stops
#[derive(Clone, Debug)]
pub enum SegmentPath {
    /// Follows the trip's shape between the two snapped stops
    Geometric(ShapeSlice),
    /// Straight line between the stops, used without a usable shape
    Linear { bearing: f64 },
}

/// The leg of a trip between two consecutive timed stops
#[derive(Clone, Debug)]
pub struct TripSegment {
    pub from_stop_id: StopIdentifier,
    pub to_stop_id: StopIdentifier,
    /// Seconds after the trip's first departure
    pub start_time: u32,
    /// Seconds after the trip's first departure, never before `start_time`
    pub end_time: u32,
    pub path: SegmentPath,
    /// Meters
    pub segment_distance: f64,
    pub from_coord: Point,
    pub to_coord: Point,
}

impl TripSegment {
    pub fn duration(&self) -> u32 {
        self.end_time - self.start_time
    }

    pub fn is_geometric(&self) -> bool {
        matches!(self.path, SegmentPath::Geometric(_))
    }

    /// The leg as at least two points with distances starting at 0. Linear
    /// legs yield their two stops.
    pub fn shape_points(&self) -> Vec<ShapePoint> {
        match &self.path {
            SegmentPath::Geometric(slice) => slice.renormalized(),
            SegmentPath::Linear { bearing } => vec![
                ShapePoint {
                    location: self.from_coord,
                    distance_from_start: 0.0,
                    bearing: *bearing,
                },
                ShapePoint {
                    location: self.to_coord,
                    distance_from_start: self.segment_distance,
                    bearing: *bearing,
                },
            ],
        }
    }
}

// ============================================================================
// Trajectories
// ============================================================================

/// Everything needed to place one trip's vehicle at any elapsed time
#[derive(Clone, Debug)]
pub struct PrecomputedTrajectory {
    pub trip_id: TripIdentifier,
    pub shape_id: Option<ShapeIdentifier>,
    /// Absolute departure from the first stop, seconds since midnight
    pub first_departure: u32,
    /// Sum of segment distances, meters
    pub total_distance: f64,
    /// End time of the last segment
    pub total_duration: u32,
    pub segments: Vec<TripSegment>,
    /// `segments[i].start_time`, non-decreasing, for binary search
    pub segment_start_times: Vec<u32>,
}

impl PrecomputedTrajectory {
    /// Assemble a trajectory. `None` when there are no segments or their start
    /// times go backwards.
    pub fn new(
        trip_id: TripIdentifier,
        shape_id: Option<ShapeIdentifier>,
        first_departure: u32,
        segments: Vec<TripSegment>,
    ) -> Option<Self> {
        let last = segments.last()?;
        let total_duration = last.end_time;
        let segment_start_times: Vec<u32> = segments.iter().map(|s| s.start_time).collect();
        if segment_start_times.windows(2).any(|w| w[0] > w[1]) {
            return None;
        }
        let total_distance = segments.iter().map(|s| s.segment_distance).sum();

        Some(Self {
            trip_id,
            shape_id,
            first_departure,
            total_distance,
            total_duration,
            segments,
            segment_start_times,
        })
    }

    /// Absolute arrival at the last stop
    pub fn last_arrival(&self) -> u32 {
        self.first_departure + self.total_duration
    }

    /// The full path as one line, for drawing
    pub fn line_string(&self) -> LineString {
        let mut coords: Vec<Coord> = Vec::new();
        for segment in &self.segments {
            for pt in segment.shape_points() {
                let coord = Coord::from(pt.location);
                if coords.last() != Some(&coord) {
                    coords.push(coord);
                }
            }
        }
        LineString::new(coords)
    }
}

// ============================================================================
// Cache
// ============================================================================

/// All trajectories of one feed. Built once, replaced wholesale on reload.
#[derive(Clone, Debug, Default)]
pub struct TrajectoryCache {
    pub trajectories: HashMap<TripIdentifier, Arc<PrecomputedTrajectory>>,
    pub processed_shapes: HashMap<ShapeIdentifier, Arc<[ShapePoint]>>,
    pub stop_coords: HashMap<StopIdentifier, Point>,
    /// Trips that could not be turned into a trajectory
    pub skipped_trips: usize,
}

impl TrajectoryCache {
    pub fn get(&self, trip_id: &str) -> Option<&Arc<PrecomputedTrajectory>> {
        self.trajectories.get(trip_id)
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }
}
