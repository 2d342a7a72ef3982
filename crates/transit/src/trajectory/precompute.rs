//! Building the trajectory cache for a whole feed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use geo::Point;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::identifiers::*;
use crate::models::records::{GtfsShape, GtfsStop, GtfsStopTime, GtfsTrip};
use crate::models::time::parse_optional_time;
use crate::progress::{band, Progress, ProgressSink, Stage};
use crate::trajectory::shape::{group_shapes, process_shape};
use crate::trajectory::snap::{map_stops_to_shape_segments, TimedStop};
use crate::trajectory::{PrecomputedTrajectory, ShapePoint, TrajectoryCache};

/// Why a trip got no trajectory
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    NoStopTimes,
    TooFewTimedStops(usize),
    UnknownStop(StopIdentifier),
    UnknownShape(ShapeIdentifier),
    TimeGoesBackwards { sequence: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoStopTimes => write!(f, "no stop times"),
            SkipReason::TooFewTimedStops(n) => write!(f, "only {n} timed stop(s)"),
            SkipReason::UnknownStop(id) => write!(f, "unknown stop {id}"),
            SkipReason::UnknownShape(id) => write!(f, "unknown shape {id}"),
            SkipReason::TimeGoesBackwards { sequence } => {
                write!(f, "times go backwards after stop #{sequence}")
            }
        }
    }
}

/// Process every shape and build one trajectory per usable trip.
///
/// Reports progress in the 0..30 band while processing shapes and 30..90
/// while building trajectories. Trips that can't be simulated are counted in
/// `skipped_trips` and logged at debug level.
pub fn precompute_trajectories(
    shapes: &[GtfsShape],
    trips: &[GtfsTrip],
    stop_times: &[GtfsStopTime],
    stops: &[GtfsStop],
    config: &SimulationConfig,
    progress: &dyn ProgressSink,
) -> TrajectoryCache {
    let _span = tracing::info_span!("precompute_trajectories", trips = trips.len()).entered();

    let stop_coords: HashMap<StopIdentifier, Point> = stops
        .iter()
        .map(|s| (s.stop_id.clone(), Point::new(s.stop_lon, s.stop_lat)))
        .collect();

    // Shapes
    progress.report(Progress::new(Stage::ProcessingShapes, 0, "Processing shapes"));

    let grouped = group_shapes(shapes);
    let total_shapes = grouped.len();
    let every_shape = config.shape_progress_every.max(1);
    let mut processed_shapes: HashMap<ShapeIdentifier, Arc<[ShapePoint]>> =
        HashMap::with_capacity(total_shapes);

    for (done, (shape_id, rows)) in grouped.into_iter().enumerate() {
        processed_shapes.insert(shape_id.clone(), process_shape(rows).into());

        let done = done + 1;
        if done % every_shape == 0 {
            progress.report(Progress::new(
                Stage::ProcessingShapes,
                band(0, 30, done, total_shapes),
                format!("Processing shapes ({done}/{total_shapes})"),
            ));
        }
    }

    // Trajectories
    progress.report(Progress::new(Stage::BuildingTrajectories, 30, "Building trajectories"));

    let mut times_by_trip: HashMap<&TripIdentifier, Vec<&GtfsStopTime>> = HashMap::new();
    for st in stop_times {
        times_by_trip.entry(&st.trip_id).or_default().push(st);
    }
    for times in times_by_trip.values_mut() {
        times.sort_by_key(|st| st.stop_sequence);
    }

    let total_trips = trips.len();
    let every_trip = config.trip_progress_every.max(1);
    let mut trajectories = HashMap::with_capacity(total_trips);
    let mut skipped_trips = 0;

    for (done, trip) in trips.iter().enumerate() {
        let times = times_by_trip.get(&trip.trip_id).map(Vec::as_slice).unwrap_or_default();

        match build_trajectory(trip, times, &stop_coords, &processed_shapes, config) {
            Ok(trajectory) => {
                trajectories.insert(trip.trip_id.clone(), Arc::new(trajectory));
            }
            Err(reason) => {
                debug!(trip_id = %trip.trip_id, %reason, "Skipping trip");
                skipped_trips += 1;
            }
        }

        let done = done + 1;
        if done % every_trip == 0 {
            progress.report(Progress::new(
                Stage::BuildingTrajectories,
                band(30, 90, done, total_trips),
                format!("Building trajectories ({done}/{total_trips})"),
            ));
        }
    }

    progress.report(Progress::new(Stage::BuildingTrajectories, 90, "Trajectories built"));
    info!(
        trajectories = trajectories.len(),
        shapes = processed_shapes.len(),
        skipped = skipped_trips,
        "Precomputed trajectories"
    );

    TrajectoryCache {
        trajectories,
        processed_shapes,
        stop_coords,
        skipped_trips,
    }
}

/// Trajectory of one trip from its stop times, sorted by sequence
pub fn build_trajectory(
    trip: &GtfsTrip,
    times: &[&GtfsStopTime],
    stop_coords: &HashMap<StopIdentifier, Point>,
    shapes: &HashMap<ShapeIdentifier, Arc<[ShapePoint]>>,
    config: &SimulationConfig,
) -> Result<PrecomputedTrajectory, SkipReason> {
    if times.is_empty() {
        return Err(SkipReason::NoStopTimes);
    }

    let shape = match &trip.shape_id {
        Some(shape_id) => Some(
            shapes
                .get(shape_id)
                .ok_or_else(|| SkipReason::UnknownShape(shape_id.clone()))?,
        ),
        None => None,
    };

    let (first_departure, stops) = timed_stops(times, stop_coords)?;
    let segments = map_stops_to_shape_segments(&stops, shape, config);

    PrecomputedTrajectory::new(trip.trip_id.clone(), trip.shape_id.clone(), first_departure, segments)
        .ok_or(SkipReason::TooFewTimedStops(stops.len()))
}

/// Resolve coordinates and times for a trip's stop visits.
///
/// A visit missing one of its times borrows the other; a visit with neither
/// is left out. Returns the absolute first departure and the visits with
/// times relative to it.
pub(crate) fn timed_stops(
    times: &[&GtfsStopTime],
    stop_coords: &HashMap<StopIdentifier, Point>,
) -> Result<(u32, Vec<TimedStop>), SkipReason> {
    let mut absolute: Vec<(&StopIdentifier, Point, u32, u32)> = Vec::with_capacity(times.len());

    for st in times {
        let arrival = parse_optional_time(st.arrival_time.as_ref());
        let departure = parse_optional_time(st.departure_time.as_ref());
        let (arrival, departure) = match (arrival, departure) {
            (Some(a), Some(d)) => (a, d),
            (Some(a), None) => (a, a),
            (None, Some(d)) => (d, d),
            (None, None) => continue,
        };

        let location = *stop_coords
            .get(&st.stop_id)
            .ok_or_else(|| SkipReason::UnknownStop(st.stop_id.clone()))?;

        absolute.push((&st.stop_id, location, arrival, departure));
    }

    if absolute.len() < 2 {
        return Err(SkipReason::TooFewTimedStops(absolute.len()));
    }

    for (i, pair) in absolute.windows(2).enumerate() {
        let (_, _, _, dep) = pair[0];
        let (_, _, next_arr, next_dep) = pair[1];
        if dep > next_arr || dep > next_dep {
            return Err(SkipReason::TimeGoesBackwards { sequence: i });
        }
    }

    let first_departure = absolute[0].3;
    let stops = absolute
        .into_iter()
        .map(|(stop_id, location, arrival, departure)| TimedStop {
            stop_id: stop_id.clone(),
            location,
            arrival: arrival.saturating_sub(first_departure),
            departure: departure.saturating_sub(first_departure),
        })
        .collect();

    Ok((first_departure, stops))
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::models::time::TimeValue;
    use crate::progress::NoProgress;
    use crate::trajectory::SegmentPath;

    fn stop(id: &str, lon: f64, lat: f64) -> GtfsStop {
        GtfsStop {
            stop_id: StopIdentifier::new(id),
            stop_name: None,
            stop_lat: lat,
            stop_lon: lon,
        }
    }

    fn trip(id: &str, shape: Option<&str>) -> GtfsTrip {
        GtfsTrip {
            route_id: RouteIdentifier::new("r1"),
            service_id: ServiceIdentifier::new("weekday"),
            trip_id: TripIdentifier::new(id),
            shape_id: shape.map(ShapeIdentifier::new),
            trip_headsign: None,
        }
    }

    fn stop_time(trip: &str, stop: &str, seq: u32, arr: Option<&str>, dep: Option<&str>) -> GtfsStopTime {
        GtfsStopTime {
            trip_id: TripIdentifier::new(trip),
            arrival_time: arr.map(TimeValue::from),
            departure_time: dep.map(TimeValue::from),
            stop_id: StopIdentifier::new(stop),
            stop_sequence: seq,
        }
    }

    fn shape_row(seq: u32, lat: f64) -> GtfsShape {
        GtfsShape {
            shape_id: ShapeIdentifier::new("north"),
            shape_pt_lat: lat,
            shape_pt_lon: 0.0,
            shape_pt_sequence: seq,
            shape_dist_traveled: None,
        }
    }

    fn line_stops() -> Vec<GtfsStop> {
        vec![stop("a", 0.0, 0.0), stop("b", 0.0, 1.0), stop("c", 0.0, 2.0)]
    }

    #[test]
    fn test_scheduled_trip_without_shape() {
        // Listed out of sequence order on purpose
        let stop_times = vec![
            stop_time("t1", "c", 3, Some("08:20:00"), Some("08:20:00")),
            stop_time("t1", "a", 1, Some("08:00:00"), Some("08:00:00")),
            stop_time("t1", "b", 2, Some("08:10:00"), Some("08:11:00")),
        ];
        let cache = precompute_trajectories(
            &[],
            &[trip("t1", None)],
            &stop_times,
            &line_stops(),
            &SimulationConfig::default(),
            &NoProgress,
        );

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.skipped_trips, 0);
        let trajectory = cache.get("t1").unwrap();
        assert_eq!(trajectory.first_departure, 8 * 3600);
        assert_eq!(trajectory.total_duration, 1200);
        assert_eq!(trajectory.segment_start_times, vec![0, 660]);
        assert_eq!(trajectory.segments[0].end_time, 600);
        assert_eq!(trajectory.segments[1].from_stop_id.as_str(), "b");
        assert!(trajectory.segments.iter().all(|s| !s.is_geometric()));
        assert_eq!(cache.stop_coords.len(), 3);
    }

    #[test]
    fn test_shapes_are_shared_between_trips() {
        let shapes: Vec<GtfsShape> = (0..=20).map(|i| shape_row(i, i as f64 * 0.1)).collect();
        let stop_times = vec![
            stop_time("t1", "a", 1, None, Some("06:00:00")),
            stop_time("t1", "b", 2, Some("06:10:00"), None),
            stop_time("t2", "a", 1, None, Some("07:00:00")),
            stop_time("t2", "b", 2, Some("07:10:00"), Some("07:10:00")),
            stop_time("t2", "c", 3, Some("07:20:00"), None),
        ];
        let cache = precompute_trajectories(
            &shapes,
            &[trip("t1", Some("north")), trip("t2", Some("north"))],
            &stop_times,
            &line_stops(),
            &SimulationConfig::default(),
            &NoProgress,
        );

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.processed_shapes.len(), 1);
        let shape = &cache.processed_shapes[&ShapeIdentifier::new("north")];

        for trajectory in cache.trajectories.values() {
            for segment in &trajectory.segments {
                match &segment.path {
                    SegmentPath::Geometric(slice) => assert!(slice.shares_shape(shape)),
                    SegmentPath::Linear { .. } => panic!("expected geometric segment"),
                }
            }
        }
        assert_eq!(cache.get("t2").unwrap().segments.len(), 2);
    }

    #[test]
    fn test_unusable_trips_are_skipped() {
        let stop_times = vec![
            // Single stop
            stop_time("lonely", "a", 1, Some("08:00:00"), Some("08:00:00")),
            // Second stop has no times at all
            stop_time("untimed", "a", 1, Some("08:00:00"), Some("08:00:00")),
            stop_time("untimed", "b", 2, None, None),
            // Stop that isn't in stops.txt
            stop_time("ghost", "a", 1, Some("08:00:00"), Some("08:00:00")),
            stop_time("ghost", "nowhere", 2, Some("08:05:00"), Some("08:05:00")),
            // Arrives before it left
            stop_time("backwards", "a", 1, Some("08:00:00"), Some("08:10:00")),
            stop_time("backwards", "b", 2, Some("08:05:00"), Some("08:05:00")),
            stop_time("shapeless", "a", 1, Some("08:00:00"), Some("08:00:00")),
            stop_time("shapeless", "b", 2, Some("08:05:00"), Some("08:05:00")),
        ];
        let trips = vec![
            trip("lonely", None),
            trip("untimed", None),
            trip("ghost", None),
            trip("backwards", None),
            trip("shapeless", Some("missing")),
            trip("no_times", None),
        ];

        let (tx, rx) = mpsc::channel();
        let cache = precompute_trajectories(
            &[],
            &trips,
            &stop_times,
            &line_stops(),
            &SimulationConfig::default(),
            &tx,
        );

        assert!(cache.is_empty());
        assert_eq!(cache.skipped_trips, trips.len());

        let updates: Vec<Progress> = rx.try_iter().collect();
        assert_eq!(updates.first().unwrap().percent, 0);
        assert_eq!(updates.last().unwrap().percent, 90);
        assert!(updates.windows(2).all(|w| w[0].percent <= w[1].percent));
    }

    #[test]
    fn test_skip_reasons() {
        let coords: HashMap<StopIdentifier, Point> =
            [(StopIdentifier::new("a"), Point::new(0.0, 0.0))].into_iter().collect();
        let shapes = HashMap::new();
        let config = SimulationConfig::default();

        let ghost = [
            stop_time("t", "a", 1, Some("08:00:00"), Some("08:00:00")),
            stop_time("t", "zz", 2, Some("08:05:00"), Some("08:05:00")),
        ];
        let refs: Vec<&GtfsStopTime> = ghost.iter().collect();
        assert_eq!(
            build_trajectory(&trip("t", None), &refs, &coords, &shapes, &config).unwrap_err(),
            SkipReason::UnknownStop(StopIdentifier::new("zz"))
        );
        assert_eq!(
            build_trajectory(&trip("t", Some("s9")), &refs, &coords, &shapes, &config).unwrap_err(),
            SkipReason::UnknownShape(ShapeIdentifier::new("s9"))
        );
        assert_eq!(
            build_trajectory(&trip("t", None), &[], &coords, &shapes, &config).unwrap_err(),
            SkipReason::NoStopTimes
        );
    }

    #[test]
    fn test_progress_band_for_shapes() {
        let shapes: Vec<GtfsShape> = (0..4)
            .map(|i| GtfsShape {
                shape_id: ShapeIdentifier::new(format!("s{i}")),
                ..shape_row(0, 0.0)
            })
            .collect();
        let config = SimulationConfig {
            shape_progress_every: 2,
            ..SimulationConfig::default()
        };

        let (tx, rx) = mpsc::channel();
        precompute_trajectories(&shapes, &[], &[], &[], &config, &tx);

        let shape_updates: Vec<u8> = rx
            .try_iter()
            .filter(|p| p.stage == Stage::ProcessingShapes)
            .map(|p| p.percent)
            .collect();
        assert_eq!(shape_updates, vec![0, 15, 30]);
    }
}
