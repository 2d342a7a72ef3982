//! Turning raw shapes.txt rows into measured polylines.

use std::collections::HashMap;

use geo::Point;

use crate::identifiers::ShapeIdentifier;
use crate::models::records::GtfsShape;
use crate::spatial::queries::{calculate_bearing, haversine_distance};
use crate::trajectory::ShapePoint;

/// Sort one shape's points by sequence and annotate them with cumulative
/// distance and outgoing bearing.
///
/// The output has one point per input row. Ties in `shape_pt_sequence` keep
/// their input order.
pub fn process_shape<'a>(points: impl IntoIterator<Item = &'a GtfsShape>) -> Vec<ShapePoint> {
    let mut sorted: Vec<&GtfsShape> = points.into_iter().collect();
    sorted.sort_by_key(|pt| pt.shape_pt_sequence);

    let mut result = Vec::with_capacity(sorted.len());
    let mut distance = 0.0;

    for (i, pt) in sorted.iter().enumerate() {
        if i > 0 {
            let prev = sorted[i - 1];
            distance += haversine_distance(
                prev.shape_pt_lat,
                prev.shape_pt_lon,
                pt.shape_pt_lat,
                pt.shape_pt_lon,
            );
        }

        let bearing = if let Some(next) = sorted.get(i + 1) {
            calculate_bearing(pt.shape_pt_lat, pt.shape_pt_lon, next.shape_pt_lat, next.shape_pt_lon)
        } else if i > 0 {
            let prev = sorted[i - 1];
            calculate_bearing(prev.shape_pt_lat, prev.shape_pt_lon, pt.shape_pt_lat, pt.shape_pt_lon)
        } else {
            0.0
        };

        result.push(ShapePoint {
            location: Point::new(pt.shape_pt_lon, pt.shape_pt_lat),
            distance_from_start: distance,
            bearing,
        });
    }

    result
}

/// Rows of shapes.txt grouped by shape ID, in input order
pub fn group_shapes(shapes: &[GtfsShape]) -> HashMap<&ShapeIdentifier, Vec<&GtfsShape>> {
    let mut grouped: HashMap<&ShapeIdentifier, Vec<&GtfsShape>> = HashMap::new();
    for pt in shapes {
        grouped.entry(&pt.shape_id).or_default().push(pt);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn row(id: &str, seq: u32, lat: f64, lon: f64) -> GtfsShape {
        GtfsShape {
            shape_id: ShapeIdentifier::new(id),
            shape_pt_lat: lat,
            shape_pt_lon: lon,
            shape_pt_sequence: seq,
            shape_dist_traveled: None,
        }
    }

    #[test]
    fn test_process_shape_sorts_and_measures() {
        // Out of order on purpose: north, then east
        let rows = vec![
            row("s", 3, 0.01, 0.01),
            row("s", 1, 0.0, 0.0),
            row("s", 2, 0.01, 0.0),
        ];
        let points = process_shape(&rows);

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].distance_from_start, 0.0);
        assert_eq!(points[1].location, Point::new(0.0, 0.01));
        assert_abs_diff_eq!(points[1].distance_from_start, 1_111.95, epsilon = 0.1);
        assert!(points[2].distance_from_start > points[1].distance_from_start);

        assert_abs_diff_eq!(points[0].bearing, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(points[1].bearing, 90.0, epsilon = 0.01);
        // Last point reuses the bearing of the final leg
        assert_abs_diff_eq!(points[2].bearing, points[1].bearing, epsilon = 1e-9);
    }

    #[test]
    fn test_distance_is_monotonic_with_repeated_points() {
        let rows = vec![
            row("s", 1, 10.0, 10.0),
            row("s", 2, 10.0, 10.0),
            row("s", 3, 10.001, 10.0),
            row("s", 4, 10.0, 10.0),
        ];
        let points = process_shape(&rows);
        assert!(points
            .windows(2)
            .all(|w| w[0].distance_from_start <= w[1].distance_from_start));
    }

    #[test]
    fn test_degenerate_shapes() {
        assert!(process_shape(&Vec::<GtfsShape>::new()).is_empty());

        let single = process_shape(&[row("s", 1, 5.0, 5.0)]);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].bearing, 0.0);
        assert_eq!(single[0].distance_from_start, 0.0);
    }

    #[test]
    fn test_group_shapes() {
        let rows = vec![row("a", 1, 0.0, 0.0), row("b", 1, 0.0, 0.0), row("a", 2, 0.0, 0.0)];
        let grouped = group_shapes(&rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&ShapeIdentifier::new("a")].len(), 2);
    }
}
