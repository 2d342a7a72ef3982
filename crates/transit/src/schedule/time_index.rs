//! Time-bucketed index of vehicle instances.
//!
//! Every instance (one run of a trip) is listed in each fixed-width bucket its
//! `[start_time, end_time]` span touches, so a frame only has to look at the
//! few buckets around the current time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::info;

use crate::config::SimulationConfig;
use crate::identifiers::*;
use crate::models::records::{GtfsFrequency, GtfsRoute, GtfsTrip};
use crate::models::types::{resolve_route_color, Result, TransitError};
use crate::progress::{Progress, ProgressSink, Stage};
use crate::schedule::frequency::frequency_windows;
use crate::trajectory::{PrecomputedTrajectory, TrajectoryCache};

/// One run of a trip at absolute times
#[derive(Clone, Debug)]
pub struct ActiveVehicleInstance {
    pub instance_id: InstanceIdentifier,
    pub trip_id: TripIdentifier,
    pub trajectory: Arc<PrecomputedTrajectory>,
    /// Seconds since midnight of the service day, may exceed 24h
    pub start_time: u32,
    /// `start_time + trajectory.total_duration`
    pub end_time: u32,
    pub route_id: RouteIdentifier,
    pub color: Arc<str>,
    pub headsign: Option<Arc<str>>,
}

impl ActiveVehicleInstance {
    pub fn is_active_at(&self, time: f64) -> bool {
        self.start_time as f64 <= time && time <= self.end_time as f64
    }
}

#[derive(Clone, Debug)]
pub struct TimeIndexedVehicles {
    buckets: HashMap<u32, Vec<Arc<ActiveVehicleInstance>>>,
    bucket_size: u32,
    instance_count: usize,
    latest_end: u32,
}

impl TimeIndexedVehicles {
    pub fn new(bucket_size: u32) -> Result<Self> {
        if bucket_size == 0 {
            return Err(TransitError::InvalidConfig(
                "bucket size must be positive".into(),
            ));
        }
        Ok(Self {
            buckets: HashMap::new(),
            bucket_size,
            instance_count: 0,
            latest_end: 0,
        })
    }

    /// Add an instance to every bucket from its start to its end, inclusive
    pub fn insert(&mut self, instance: ActiveVehicleInstance) {
        let instance = Arc::new(instance);
        let first = instance.start_time / self.bucket_size;
        let last = instance.end_time / self.bucket_size;
        for bucket in first..=last {
            self.buckets.entry(bucket).or_default().push(instance.clone());
        }
        self.instance_count += 1;
        self.latest_end = self.latest_end.max(instance.end_time);
    }

    /// Bucket holding `time`; negative times fall into bucket 0
    pub fn bucket_of(&self, time: f64) -> u32 {
        (time.max(0.0) / self.bucket_size as f64).floor() as u32
    }

    pub fn bucket(&self, bucket: u32) -> &[Arc<ActiveVehicleInstance>] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn bucket_size(&self) -> u32 {
        self.bucket_size
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    pub fn is_empty(&self) -> bool {
        self.instance_count == 0
    }

    /// Latest end time of any instance, 0 when empty
    pub fn latest_end(&self) -> u32 {
        self.latest_end
    }

    /// Every instance exactly once, in no particular order
    pub fn instances(&self) -> impl Iterator<Item = &Arc<ActiveVehicleInstance>> + '_ {
        self.buckets.iter().flat_map(move |(&bucket, instances)| {
            instances
                .iter()
                .filter(move |instance| instance.start_time / self.bucket_size == bucket)
        })
    }
}

struct TripMeta {
    route_id: RouteIdentifier,
    color: Arc<str>,
    headsign: Option<Arc<str>>,
}

/// Expand every precomputed trip into its runs and bucket them.
///
/// Trips with frequency windows get one instance per headway departure,
/// named `{trip}_{n}`. Every other trip runs once, at its scheduled first
/// departure, under its own ID. With `active_services`, trips of other
/// services are left out. Reports progress from 92 to 98 percent.
pub fn build_time_index(
    cache: &TrajectoryCache,
    trips: &[GtfsTrip],
    frequencies: &[GtfsFrequency],
    routes: &[GtfsRoute],
    active_services: Option<&HashSet<ServiceIdentifier>>,
    config: &SimulationConfig,
    progress: &dyn ProgressSink,
) -> Result<TimeIndexedVehicles> {
    config.validate()?;
    let _span = tracing::info_span!("build_time_index").entered();
    progress.report(Progress::new(Stage::IndexingVehicles, 92, "Building time index"));

    let mut index = TimeIndexedVehicles::new(config.bucket_size_secs)?;

    let colors: HashMap<&RouteIdentifier, Arc<str>> = routes
        .iter()
        .map(|route| {
            let color = resolve_route_color(route.route_color.as_deref(), &config.default_route_color);
            (&route.route_id, Arc::from(color))
        })
        .collect();
    let default_color: Arc<str> = Arc::from(config.default_route_color.as_str());
    let windows = frequency_windows(frequencies);

    let mut frequency_trips = 0;
    for trip in trips {
        if active_services.is_some_and(|services| !services.contains(&trip.service_id)) {
            continue;
        }
        let Some(trajectory) = cache.trajectories.get(&trip.trip_id) else {
            continue;
        };

        let meta = TripMeta {
            route_id: trip.route_id.clone(),
            color: colors
                .get(&trip.route_id)
                .cloned()
                .unwrap_or_else(|| default_color.clone()),
            headsign: trip.trip_headsign.as_deref().map(Arc::from),
        };

        match windows.get(&trip.trip_id) {
            Some(trip_windows) => {
                frequency_trips += 1;
                for window in trip_windows {
                    for (n, departure) in window.departures() {
                        index.insert(instance(
                            InstanceIdentifier::repetition(&trip.trip_id, n),
                            &trip.trip_id,
                            trajectory,
                            departure,
                            &meta,
                        ));
                    }
                }
            }
            None => index.insert(instance(
                InstanceIdentifier::scheduled(&trip.trip_id),
                &trip.trip_id,
                trajectory,
                trajectory.first_departure,
                &meta,
            )),
        }
    }

    progress.report(Progress::new(Stage::IndexingVehicles, 98, "Time index built"));
    info!(
        instances = index.instance_count(),
        buckets = index.bucket_count(),
        frequency_trips,
        "Built time index"
    );

    Ok(index)
}

fn instance(
    instance_id: InstanceIdentifier,
    trip_id: &TripIdentifier,
    trajectory: &Arc<PrecomputedTrajectory>,
    start_time: u32,
    meta: &TripMeta,
) -> ActiveVehicleInstance {
    ActiveVehicleInstance {
        instance_id,
        trip_id: trip_id.clone(),
        trajectory: trajectory.clone(),
        start_time,
        end_time: start_time.saturating_add(trajectory.total_duration),
        route_id: meta.route_id.clone(),
        color: meta.color.clone(),
        headsign: meta.headsign.clone(),
    }
}

#[cfg(test)]
mod tests {
    use geo::Point;

    use super::*;
    use crate::models::time::TimeValue;
    use crate::progress::NoProgress;
    use crate::trajectory::{SegmentPath, TripSegment};

    fn trajectory(trip: &str, first_departure: u32, duration: u32) -> Arc<PrecomputedTrajectory> {
        let segment = TripSegment {
            from_stop_id: StopIdentifier::new("a"),
            to_stop_id: StopIdentifier::new("b"),
            start_time: 0,
            end_time: duration,
            path: SegmentPath::Linear { bearing: 0.0 },
            segment_distance: 1_000.0,
            from_coord: Point::new(0.0, 0.0),
            to_coord: Point::new(0.0, 0.01),
        };
        Arc::new(
            PrecomputedTrajectory::new(TripIdentifier::new(trip), None, first_departure, vec![segment])
                .unwrap(),
        )
    }

    fn cache(entries: &[(&str, u32, u32)]) -> TrajectoryCache {
        let mut cache = TrajectoryCache::default();
        for &(trip, first_departure, duration) in entries {
            cache
                .trajectories
                .insert(TripIdentifier::new(trip), trajectory(trip, first_departure, duration));
        }
        cache
    }

    fn trip(id: &str, route: &str, service: &str) -> GtfsTrip {
        GtfsTrip {
            route_id: RouteIdentifier::new(route),
            service_id: ServiceIdentifier::new(service),
            trip_id: TripIdentifier::new(id),
            shape_id: None,
            trip_headsign: Some(format!("To {id}")),
        }
    }

    fn route(id: &str, color: Option<&str>) -> GtfsRoute {
        GtfsRoute {
            route_id: RouteIdentifier::new(id),
            route_short_name: None,
            route_long_name: None,
            route_color: color.map(str::to_string),
        }
    }

    fn freq(trip: &str, start: &str, end: &str, headway: u32) -> GtfsFrequency {
        GtfsFrequency {
            trip_id: TripIdentifier::new(trip),
            start_time: TimeValue::from(start),
            end_time: TimeValue::from(end),
            headway_secs: headway,
        }
    }

    fn empty_instance(start: u32, end: u32) -> ActiveVehicleInstance {
        ActiveVehicleInstance {
            instance_id: InstanceIdentifier::new("x"),
            trip_id: TripIdentifier::new("x"),
            trajectory: trajectory("x", start, end - start),
            start_time: start,
            end_time: end,
            route_id: RouteIdentifier::new("r"),
            color: Arc::from("#3388ff"),
            headsign: None,
        }
    }

    #[test]
    fn test_bucket_fan_out() {
        let mut index = TimeIndexedVehicles::new(300).unwrap();
        index.insert(empty_instance(290, 310));

        assert_eq!(index.bucket(0).len(), 1);
        assert_eq!(index.bucket(1).len(), 1);
        assert!(index.bucket(2).is_empty());
        assert_eq!(index.instance_count(), 1);
        assert_eq!(index.instances().count(), 1);
        assert_eq!(index.latest_end(), 310);
        assert_eq!(index.bucket_of(299.9), 0);
        assert_eq!(index.bucket_of(-5.0), 0);

        assert!(TimeIndexedVehicles::new(0).is_err());
    }

    #[test]
    fn test_frequency_expansion() {
        let cache = cache(&[("loop", 0, 1_800)]);
        let index = build_time_index(
            &cache,
            &[trip("loop", "r1", "weekday")],
            &[freq("loop", "06:00:00", "07:00:00", 600)],
            &[route("r1", Some("FF0000"))],
            None,
            &SimulationConfig::default(),
            &NoProgress,
        )
        .unwrap();

        assert_eq!(index.instance_count(), 6);
        let mut starts: Vec<(String, u32)> = index
            .instances()
            .map(|i| (i.instance_id.to_string(), i.start_time))
            .collect();
        starts.sort_by_key(|(_, start)| *start);
        assert_eq!(starts.first().unwrap(), &("loop_0".to_string(), 21_600));
        assert_eq!(starts.last().unwrap(), &("loop_5".to_string(), 24_600));

        let first = index.instances().find(|i| i.start_time == 21_600).unwrap();
        assert_eq!(first.end_time, 23_400);
        assert_eq!(&*first.color, "#FF0000");
        assert_eq!(first.headsign.as_deref(), Some("To loop"));
    }

    #[test]
    fn test_scheduled_and_mixed_feed() {
        let cache = cache(&[("a", 28_800, 1_200), ("b", 30_000, 600), ("c", 0, 300)]);
        let trips = vec![
            trip("a", "r1", "weekday"),
            trip("b", "r2", "weekday"),
            trip("c", "r1", "weekday"),
            // No trajectory: nothing to index
            trip("d", "r1", "weekday"),
        ];
        let index = build_time_index(
            &cache,
            &trips,
            &[freq("c", "10:00:00", "10:30:00", 900)],
            &[route("r1", None), route("r2", Some("#00ff00"))],
            None,
            &SimulationConfig::default(),
            &NoProgress,
        )
        .unwrap();

        // a and b once each, c twice
        assert_eq!(index.instance_count(), 4);

        let a = index.instances().find(|i| i.trip_id.as_str() == "a").unwrap();
        assert_eq!(a.instance_id.as_str(), "a");
        assert_eq!((a.start_time, a.end_time), (28_800, 30_000));
        assert_eq!(&*a.color, "#3388ff");
        assert_eq!(index.bucket(96).len(), 1);

        let b = index.instances().find(|i| i.trip_id.as_str() == "b").unwrap();
        assert_eq!(&*b.color, "#00ff00");

        let ids: HashSet<String> = index.instances().map(|i| i.instance_id.to_string()).collect();
        assert_eq!(ids.len(), index.instance_count());
        assert!(ids.contains("c_0") && ids.contains("c_1"));
    }

    #[test]
    fn test_service_filter() {
        let cache = cache(&[("weekday_trip", 28_800, 600), ("sunday_trip", 28_800, 600)]);
        let trips = vec![trip("weekday_trip", "r1", "weekday"), trip("sunday_trip", "r1", "sunday")];
        let active: HashSet<ServiceIdentifier> = [ServiceIdentifier::new("sunday")].into_iter().collect();

        let index = build_time_index(
            &cache,
            &trips,
            &[],
            &[],
            Some(&active),
            &SimulationConfig::default(),
            &NoProgress,
        )
        .unwrap();

        assert_eq!(index.instance_count(), 1);
        assert_eq!(index.instances().next().unwrap().trip_id.as_str(), "sunday_trip");
    }

    #[test]
    fn test_out_of_range_frequency_times_are_dropped() {
        let cache = cache(&[("t", 28_800, 1_200)]);
        let index = build_time_index(
            &cache,
            &[trip("t", "r1", "s")],
            &[freq("t", "1193046:28:00", "1193046:28:10", 600)],
            &[],
            None,
            &SimulationConfig::default(),
            &NoProgress,
        )
        .unwrap();

        // No usable window left, so the trip runs once on its schedule
        assert_eq!(index.instance_count(), 1);
        let only = index.instances().next().unwrap();
        assert_eq!(only.instance_id.as_str(), "t");
        assert_eq!((only.start_time, only.end_time), (28_800, 30_000));
    }

    #[test]
    fn test_every_instance_covers_its_span() {
        let cache = cache(&[("t", 0, 2_000)]);
        let index = build_time_index(
            &cache,
            &[trip("t", "r1", "s")],
            &[freq("t", "05:00:00", "09:00:00", 420)],
            &[],
            None,
            &SimulationConfig::default(),
            &NoProgress,
        )
        .unwrap();

        for instance in index.instances() {
            for bucket in instance.start_time / 300..=instance.end_time / 300 {
                assert!(index
                    .bucket(bucket)
                    .iter()
                    .any(|i| i.instance_id == instance.instance_id));
            }
        }
    }
}
