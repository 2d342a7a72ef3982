//! Snapping a trip's stops onto its shape and cutting the shape into legs.

use std::sync::Arc;

use geo::Point;

use crate::config::SimulationConfig;
use crate::identifiers::StopIdentifier;
use crate::spatial::queries::{bearing_between, distance_between};
use crate::trajectory::{SegmentPath, ShapePoint, ShapeSlice, TripSegment};

/// A stop visit with resolved coordinates and times relative to the trip's
/// first departure
#[derive(Clone, Debug, PartialEq)]
pub struct TimedStop {
    pub stop_id: StopIdentifier,
    pub location: Point,
    pub arrival: u32,
    pub departure: u32,
}

/// Index and distance (meters) of the shape point nearest to `location`,
/// scanning forward from `start_index` only.
///
/// The scan gives up once the distance has grown past
/// `snap_exit_factor` times the best distance and more than
/// `snap_exit_min_points` points were scanned beyond the best one. On shapes
/// that double back this can miss a closer point further along.
pub fn nearest_shape_point(
    location: Point,
    shape: &[ShapePoint],
    start_index: usize,
    config: &SimulationConfig,
) -> (usize, f64) {
    let mut best_index = start_index;
    let mut best_distance = f64::INFINITY;

    for (i, pt) in shape.iter().enumerate().skip(start_index) {
        let dist = distance_between(location, pt.location);
        if dist < best_distance {
            best_distance = dist;
            best_index = i;
        }

        if dist > best_distance * config.snap_exit_factor && i > best_index + config.snap_exit_min_points {
            break;
        }
    }

    (best_index, best_distance)
}

/// Shape index for every stop, never moving backwards along the shape.
///
/// A stop further than `max_snap_distance_m` from the shape reuses the
/// previous stop's index.
pub fn snap_stops_to_shape(stops: &[TimedStop], shape: &[ShapePoint], config: &SimulationConfig) -> Vec<usize> {
    let mut indices = Vec::with_capacity(stops.len());
    let mut last_index = 0;

    for stop in stops {
        let (index, distance) = nearest_shape_point(stop.location, shape, last_index, config);
        if distance > config.max_snap_distance_m {
            tracing::trace!(stop_id = %stop.stop_id, distance, "Stop too far from shape");
            indices.push(last_index);
        } else {
            indices.push(index);
            last_index = index;
        }
    }

    indices
}

/// One segment per consecutive pair of stops, following `shape` where the
/// stops snap to distinct points and drawing straight lines elsewhere.
///
/// Without a shape of at least two points every segment is linear.
pub fn map_stops_to_shape_segments(
    stops: &[TimedStop],
    shape: Option<&Arc<[ShapePoint]>>,
    config: &SimulationConfig,
) -> Vec<TripSegment> {
    let shape = match shape {
        Some(shape) if shape.len() >= 2 => shape,
        _ => return linear_segments(stops),
    };

    let indices = snap_stops_to_shape(stops, shape, config);

    stops
        .windows(2)
        .zip(indices.windows(2))
        .map(|(pair, idx)| {
            let (from, to) = (&pair[0], &pair[1]);
            match ShapeSlice::new(shape.clone(), idx[0], idx[1]) {
                Some(slice) => TripSegment {
                    from_stop_id: from.stop_id.clone(),
                    to_stop_id: to.stop_id.clone(),
                    start_time: from.departure,
                    end_time: to.arrival,
                    segment_distance: slice.length(),
                    path: SegmentPath::Geometric(slice),
                    from_coord: from.location,
                    to_coord: to.location,
                },
                None => linear_segment(from, to),
            }
        })
        .collect()
}

/// Straight-line segments between consecutive stops
pub fn linear_segments(stops: &[TimedStop]) -> Vec<TripSegment> {
    stops
        .windows(2)
        .map(|pair| linear_segment(&pair[0], &pair[1]))
        .collect()
}

fn linear_segment(from: &TimedStop, to: &TimedStop) -> TripSegment {
    TripSegment {
        from_stop_id: from.stop_id.clone(),
        to_stop_id: to.stop_id.clone(),
        start_time: from.departure,
        end_time: to.arrival,
        path: SegmentPath::Linear {
            bearing: bearing_between(from.location, to.location),
        },
        segment_distance: distance_between(from.location, to.location),
        from_coord: from.location,
        to_coord: to.location,
    }
}
