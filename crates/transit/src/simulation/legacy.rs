//! Position engine that works straight from the raw timetable.
//!
//! Used before precomputation has finished. Vehicles move in straight lines
//! between stops and wait at stops while dwelling. The per-trip timetables
//! are rebuilt only when the sizes of the input collections change.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use geo::Point;
use tracing::debug;

use crate::config::SimulationConfig;
use crate::identifiers::*;
use crate::models::records::{GtfsFeed, GtfsStopTime};
use crate::models::time::SECONDS_PER_DAY;
use crate::models::traits::VehicleSource;
use crate::models::types::{resolve_route_color, VehiclePosition};
use crate::schedule::frequency::{frequency_windows, FrequencyWindow};
use crate::spatial::queries::{bearing_between, lerp};
use crate::trajectory::precompute::timed_stops;
use crate::trajectory::TimedStop;

/// Input sizes the timetables were built from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct CacheKey {
    stops: usize,
    routes: usize,
    trips: usize,
    stop_times: usize,
    frequencies: usize,
}

impl CacheKey {
    fn of(feed: &GtfsFeed) -> Self {
        Self {
            stops: feed.stops.len(),
            routes: feed.routes.len(),
            trips: feed.trips.len(),
            stop_times: feed.stop_times.len(),
            frequencies: feed.frequencies.len(),
        }
    }
}

/// One trip's stop visits with times relative to its first departure
#[derive(Debug)]
struct Timetable {
    trip_id: TripIdentifier,
    route_id: RouteIdentifier,
    color: Arc<str>,
    headsign: Option<Arc<str>>,
    first_departure: u32,
    duration: u32,
    stops: Vec<TimedStop>,
    windows: Vec<FrequencyWindow>,
}

impl Timetable {
    fn latest_end(&self) -> u32 {
        let last_start = self
            .windows
            .iter()
            .filter_map(|w| w.departures().last().map(|(_, dep)| dep))
            .max()
            .unwrap_or(self.first_departure);
        last_start + self.duration
    }

    /// Where the vehicle is `elapsed` seconds after departure:
    /// position, bearing, next stop and leg fraction
    fn locate(&self, elapsed: f64) -> Option<(Point, f64, &StopIdentifier, f64)> {
        if elapsed < 0.0 || elapsed > self.duration as f64 {
            return None;
        }

        let arrived = self.stops.partition_point(|s| s.arrival as f64 <= elapsed);
        let Some(current) = arrived.checked_sub(1) else {
            let first = self.stops.first()?;
            return Some((first.location, self.leg_bearing(0), &first.stop_id, 0.0));
        };

        let stop = &self.stops[current];
        let next = match self.stops.get(current + 1) {
            Some(next) if elapsed > stop.departure as f64 => next,
            // Dwelling, or already at the last stop
            _ => return Some((stop.location, self.leg_bearing(current), &stop.stop_id, 0.0)),
        };

        let span = next.arrival.saturating_sub(stop.departure) as f64;
        let t = if span > 0.0 {
            ((elapsed - stop.departure as f64) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Some((
            lerp(stop.location, next.location, t),
            bearing_between(stop.location, next.location),
            &next.stop_id,
            t,
        ))
    }

    /// Bearing of the leg leaving stop `i`, or arriving at it for the last stop
    fn leg_bearing(&self, i: usize) -> f64 {
        match (self.stops.get(i), self.stops.get(i + 1)) {
            (Some(from), Some(to)) => bearing_between(from.location, to.location),
            (Some(to), None) if i > 0 => bearing_between(self.stops[i - 1].location, to.location),
            _ => 0.0,
        }
    }

    fn position(&self, instance_id: &InstanceIdentifier, elapsed: f64) -> Option<VehiclePosition> {
        let (position, bearing, next_stop_id, segment_progress) = self.locate(elapsed)?;
        let progress = if self.duration > 0 {
            elapsed / self.duration as f64
        } else {
            0.0
        };

        Some(VehiclePosition {
            trip_id: instance_id.clone(),
            route_id: self.route_id.clone(),
            position,
            bearing,
            next_stop_id: next_stop_id.clone(),
            progress,
            segment_progress,
            color: self.color.clone(),
            headsign: self.headsign.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct Built {
    key: CacheKey,
    timetables: Vec<Timetable>,
    latest_end: u32,
}

/// Straight-line engine over the raw feed
#[derive(Debug)]
pub struct LegacyPositionEngine {
    default_color: String,
    active_services: Option<HashSet<ServiceIdentifier>>,
    built: Option<Built>,
    rebuilds: usize,
}

impl LegacyPositionEngine {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            default_color: config.default_route_color.clone(),
            active_services: None,
            built: None,
            rebuilds: 0,
        }
    }

    /// Restrict to trips of these services; `None` runs every trip
    pub fn set_active_services(&mut self, services: Option<HashSet<ServiceIdentifier>>) {
        self.active_services = services;
        self.invalidate();
    }

    /// Forget the timetables; the next query rebuilds them
    pub fn invalidate(&mut self) {
        self.built = None;
    }

    /// How many times the timetables were built
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    /// Positions of every vehicle running at `time` on the simulation clock
    pub fn positions(&mut self, feed: &GtfsFeed, time: f64) -> Vec<VehiclePosition> {
        let key = CacheKey::of(feed);
        if self.built.as_ref().map(|b| b.key) != Some(key) {
            self.built = Some(self.build(feed, key));
            self.rebuilds += 1;
        }
        let Some(built) = &self.built else {
            return Vec::new();
        };

        let mut positions = Vec::new();
        collect(built, time, None, &mut positions);
        let next_day = time + SECONDS_PER_DAY as f64;
        if built.latest_end as f64 >= next_day {
            collect(built, next_day, Some(time), &mut positions);
        }
        positions
    }

    fn build(&self, feed: &GtfsFeed, key: CacheKey) -> Built {
        let stop_coords: HashMap<StopIdentifier, Point> = feed
            .stops
            .iter()
            .map(|s| (s.stop_id.clone(), Point::new(s.stop_lon, s.stop_lat)))
            .collect();
        let colors: HashMap<&RouteIdentifier, Option<&str>> = feed
            .routes
            .iter()
            .map(|r| (&r.route_id, r.route_color.as_deref()))
            .collect();

        let mut times_by_trip: HashMap<&TripIdentifier, Vec<&GtfsStopTime>> = HashMap::new();
        for st in &feed.stop_times {
            times_by_trip.entry(&st.trip_id).or_default().push(st);
        }
        let mut windows = frequency_windows(&feed.frequencies);

        let mut timetables = Vec::new();
        for trip in &feed.trips {
            if let Some(services) = &self.active_services {
                if !services.contains(&trip.service_id) {
                    continue;
                }
            }
            let Some(times) = times_by_trip.get_mut(&trip.trip_id) else {
                continue;
            };
            times.sort_by_key(|st| st.stop_sequence);

            let (first_departure, stops) = match timed_stops(times, &stop_coords) {
                Ok(resolved) => resolved,
                Err(reason) => {
                    debug!(trip_id = %trip.trip_id, %reason, "Skipping trip");
                    continue;
                }
            };
            let duration = stops.last().map(|s| s.arrival).unwrap_or_default();
            let color = resolve_route_color(
                colors.get(&trip.route_id).copied().flatten(),
                &self.default_color,
            );

            timetables.push(Timetable {
                trip_id: trip.trip_id.clone(),
                route_id: trip.route_id.clone(),
                color: Arc::from(color),
                headsign: trip.trip_headsign.as_deref().map(Arc::from),
                first_departure,
                duration,
                stops,
                windows: windows.remove(&trip.trip_id).unwrap_or_default(),
            });
        }

        let latest_end = timetables.iter().map(Timetable::latest_end).max().unwrap_or(0);
        debug!(trips = timetables.len(), "Built legacy timetables");

        Built {
            key,
            timetables,
            latest_end,
        }
    }
}

fn collect(built: &Built, time: f64, already_seen: Option<f64>, out: &mut Vec<VehiclePosition>) {
    let seen = |start: u32, duration: u32| {
        already_seen.is_some_and(|t| start as f64 <= t && t <= start.saturating_add(duration) as f64)
    };

    for timetable in &built.timetables {
        if timetable.windows.is_empty() {
            let start = timetable.first_departure;
            if seen(start, timetable.duration) {
                continue;
            }
            let id = InstanceIdentifier::scheduled(&timetable.trip_id);
            if let Some(position) = timetable.position(&id, time - start as f64) {
                out.push(position);
            }
            continue;
        }

        for window in &timetable.windows {
            for k in window.active_at(time, timetable.duration) {
                let start = window.start + k * window.headway;
                if seen(start, timetable.duration) {
                    continue;
                }
                let id = InstanceIdentifier::repetition(&timetable.trip_id, window.first_instance + k);
                if let Some(position) = timetable.position(&id, time - start as f64) {
                    out.push(position);
                }
            }
        }
    }
}

impl VehicleSource for LegacyPositionEngine {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn vehicle_positions(&mut self, feed: &GtfsFeed, time_seconds: f64) -> Vec<VehiclePosition> {
        self.positions(feed, time_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::records::{GtfsFrequency, GtfsRoute, GtfsStop, GtfsTrip};
    use crate::models::time::TimeValue;
    use approx::assert_abs_diff_eq;

    fn stop_time(trip: &str, stop: &str, seq: u32, arr: &str, dep: &str) -> GtfsStopTime {
        GtfsStopTime {
            trip_id: TripIdentifier::new(trip),
            arrival_time: Some(TimeValue::from(arr)),
            departure_time: Some(TimeValue::from(dep)),
            stop_id: StopIdentifier::new(stop),
            stop_sequence: seq,
        }
    }

    fn feed() -> GtfsFeed {
        GtfsFeed {
            stops: vec![
                GtfsStop { stop_id: StopIdentifier::new("a"), stop_name: None, stop_lat: 0.0, stop_lon: 0.0 },
                GtfsStop { stop_id: StopIdentifier::new("b"), stop_name: None, stop_lat: 1.0, stop_lon: 0.0 },
                GtfsStop { stop_id: StopIdentifier::new("c"), stop_name: None, stop_lat: 2.0, stop_lon: 0.0 },
            ],
            routes: vec![GtfsRoute {
                route_id: RouteIdentifier::new("r1"),
                route_short_name: Some("1".into()),
                route_long_name: None,
                route_color: Some("aa0000".into()),
            }],
            trips: vec![GtfsTrip {
                route_id: RouteIdentifier::new("r1"),
                service_id: ServiceIdentifier::new("weekday"),
                trip_id: TripIdentifier::new("t1"),
                shape_id: None,
                trip_headsign: Some("North".into()),
            }],
            stop_times: vec![
                stop_time("t1", "a", 1, "08:00:00", "08:00:00"),
                stop_time("t1", "b", 2, "08:10:00", "08:12:00"),
                stop_time("t1", "c", 3, "08:22:00", "08:22:00"),
            ],
            ..GtfsFeed::default()
        }
    }

    #[test]
    fn test_moves_between_stops() {
        let mut engine = LegacyPositionEngine::new(&SimulationConfig::default());
        let positions = engine.positions(&feed(), 8.0 * 3600.0 + 300.0);

        assert_eq!(positions.len(), 1);
        let vehicle = &positions[0];
        assert_eq!(vehicle.trip_id.as_str(), "t1");
        assert_eq!(vehicle.next_stop_id.as_str(), "b");
        assert_eq!(&*vehicle.color, "#aa0000");
        assert_eq!(vehicle.headsign.as_deref(), Some("North"));
        assert_abs_diff_eq!(vehicle.position.y(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(vehicle.segment_progress, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(vehicle.progress, 300.0 / 1320.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vehicle.bearing, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dwells_at_stop() {
        let mut engine = LegacyPositionEngine::new(&SimulationConfig::default());
        let positions = engine.positions(&feed(), 8.0 * 3600.0 + 660.0);

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].position, Point::new(0.0, 1.0));
        assert_eq!(positions[0].next_stop_id.as_str(), "b");
        assert_eq!(positions[0].segment_progress, 0.0);

        assert!(engine.positions(&feed(), 7.0 * 3600.0).is_empty());
        assert!(engine.positions(&feed(), 9.0 * 3600.0).is_empty());
    }

    #[test]
    fn test_rebuilds_only_when_inputs_change() {
        let mut engine = LegacyPositionEngine::new(&SimulationConfig::default());
        let mut feed = feed();

        engine.positions(&feed, 29_000.0);
        engine.positions(&feed, 29_100.0);
        assert_eq!(engine.rebuilds(), 1);

        feed.frequencies.push(GtfsFrequency {
            trip_id: TripIdentifier::new("t1"),
            start_time: TimeValue::from("06:00:00"),
            end_time: TimeValue::from("07:00:00"),
            headway_secs: 600,
        });
        let positions = engine.positions(&feed, 6.0 * 3600.0 + 900.0);
        assert_eq!(engine.rebuilds(), 2);

        // Departures at 06:00 and 06:10 are out 15 minutes in
        let mut ids: Vec<&str> = positions.iter().map(|p| p.trip_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["t1_0", "t1_1"]);

        engine.invalidate();
        engine.positions(&feed, 0.0);
        assert_eq!(engine.rebuilds(), 3);
    }

    #[test]
    fn test_service_filter() {
        let mut engine = LegacyPositionEngine::new(&SimulationConfig::default());
        engine.set_active_services(Some([ServiceIdentifier::new("sunday")].into_iter().collect()));
        assert!(engine.positions(&feed(), 29_000.0).is_empty());

        engine.set_active_services(None);
        assert_eq!(engine.positions(&feed(), 29_000.0).len(), 1);
    }

    #[test]
    fn test_after_midnight() {
        let mut feed = feed();
        feed.stop_times = vec![
            stop_time("t1", "a", 1, "23:50:00", "23:50:00"),
            stop_time("t1", "c", 2, "24:30:00", "24:30:00"),
        ];
        let mut engine = LegacyPositionEngine::new(&SimulationConfig::default());

        let positions = engine.positions(&feed, 600.0);
        assert_eq!(positions.len(), 1);
        assert_abs_diff_eq!(positions[0].progress, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(positions[0].position.y(), 1.0, epsilon = 1e-12);
    }
}
