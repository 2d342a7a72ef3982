//! Placing a vehicle on its precomputed trajectory.
//!
//! This runs once per active vehicle per frame. Both lookups are binary
//! searches, so a frame costs about `active vehicles * log(segments)`.

use geo::Point;

use crate::identifiers::StopIdentifier;
use crate::spatial::queries::lerp;
use crate::trajectory::{PrecomputedTrajectory, SegmentPath, ShapePoint, TripSegment};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InterpolationResult<'a> {
    pub position: Point,
    pub bearing: f64,
    /// Destination of the current segment
    pub next_stop_id: &'a StopIdentifier,
    /// `elapsed / total_duration`, 0..=1
    pub progress: f64,
    /// Fraction of the current segment's duration, 0..=1
    pub segment_progress: f64,
    pub segment_index: usize,
}

/// Index of the last segment starting at or before `elapsed`; 0 when
/// `elapsed` comes before every segment.
pub fn find_segment_index(segment_start_times: &[u32], elapsed: f64) -> usize {
    segment_start_times
        .partition_point(|&start| start as f64 <= elapsed)
        .saturating_sub(1)
}

/// Bracketing point index and local fraction for a distance measured from
/// the first of `points`.
///
/// Distances at or past the end land on the last pair with fraction 1.
pub fn find_points_for_distance(points: &[ShapePoint], distance: f64) -> (usize, f64) {
    if points.len() < 2 {
        return (0, 0.0);
    }

    let base = points[0].distance_from_start;
    let last = points.len() - 1;
    if distance >= points[last].distance_from_start - base {
        return (last - 1, 1.0);
    }
    if distance <= 0.0 {
        return (0, 0.0);
    }

    let index = points
        .partition_point(|pt| pt.distance_from_start - base <= distance)
        .saturating_sub(1)
        .min(last - 1);

    let (p1, p2) = (&points[index], &points[index + 1]);
    let length = p2.distance_from_start - p1.distance_from_start;
    let t = if length > 0.0 {
        ((distance - (p1.distance_from_start - base)) / length).clamp(0.0, 1.0)
    } else {
        0.0
    };

    (index, t)
}

/// Position on `segment` after `t` (0..=1) of its duration, with bearing
fn position_on_segment(segment: &TripSegment, t: f64) -> (Point, f64) {
    match &segment.path {
        SegmentPath::Geometric(slice) => {
            let points = slice.points();
            let (index, local) = find_points_for_distance(points, t * segment.segment_distance);
            let (p1, p2) = (&points[index], &points[index + 1]);
            (lerp(p1.location, p2.location, local), p1.bearing)
        }
        SegmentPath::Linear { bearing } => (lerp(segment.from_coord, segment.to_coord, t), *bearing),
    }
}

/// Where a vehicle is `elapsed` seconds after its trip instance started.
///
/// Negative `elapsed` is treated as the start. Returns `None` once the trip
/// is over.
pub fn interpolate_on_trajectory(
    trajectory: &PrecomputedTrajectory,
    elapsed: f64,
) -> Option<InterpolationResult<'_>> {
    if trajectory.segments.is_empty() || elapsed.is_nan() {
        return None;
    }

    let elapsed = elapsed.max(0.0);
    let total = trajectory.total_duration as f64;
    if elapsed > total {
        return None;
    }

    let segment_index = find_segment_index(&trajectory.segment_start_times, elapsed);
    let segment = trajectory.segments.get(segment_index)?;

    let duration = segment.duration() as f64;
    let t = if duration > 0.0 {
        ((elapsed - segment.start_time as f64) / duration).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let (position, bearing) = position_on_segment(segment, t);
    let progress = if total > 0.0 { elapsed / total } else { 0.0 };

    Some(InterpolationResult {
        position,
        bearing,
        next_stop_id: &segment.to_stop_id,
        progress,
        segment_progress: t,
        segment_index,
    })
}
