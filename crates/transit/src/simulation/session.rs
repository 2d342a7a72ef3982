//! The loaded feed and whichever position engine can serve it.
//!
//! A session starts out on the legacy engine. Once a precomputation for the
//! current feed is installed, queries move over to the time index. Reloading
//! drops the old precomputed data before anything else happens, and a
//! generation counter keeps results computed for an older feed from being
//! installed over a newer one.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::SimulationConfig;
use crate::identifiers::ServiceIdentifier;
use crate::models::calendar::active_services_on;
use crate::models::records::{FeedStats, GtfsFeed};
use crate::models::traits::VehicleSource;
use crate::models::types::{Result, TransitError, VehiclePosition};
use crate::progress::{Progress, ProgressSink, Stage};
use crate::schedule::{build_time_index, TimeIndexedVehicles};
use crate::simulation::legacy::LegacyPositionEngine;
use crate::simulation::positions::vehicle_positions_optimized;
use crate::simulation::worker::{spawn_precompute, PrecomputeHandle};
use crate::spatial::StopLocator;
use crate::trajectory::{precompute_trajectories, PrecomputedTrajectory, TrajectoryCache};

/// Trajectories and time index of one feed generation. Immutable once built.
#[derive(Debug)]
pub struct PrecomputedFeed {
    pub generation: u64,
    pub cache: TrajectoryCache,
    pub index: TimeIndexedVehicles,
}

impl PrecomputedFeed {
    /// Run both passes over `feed`, finishing with a `Complete` progress update
    pub fn build(
        feed: &GtfsFeed,
        config: &SimulationConfig,
        active_services: Option<&HashSet<ServiceIdentifier>>,
        generation: u64,
        progress: &dyn ProgressSink,
    ) -> Result<Self> {
        config.validate()?;

        let cache = precompute_trajectories(
            &feed.shapes,
            &feed.trips,
            &feed.stop_times,
            &feed.stops,
            config,
            progress,
        );
        let index = build_time_index(
            &cache,
            &feed.trips,
            &feed.frequencies,
            &feed.routes,
            active_services,
            config,
            progress,
        )?;

        progress.report(Progress::new(Stage::Complete, 100, "Ready"));

        Ok(Self {
            generation,
            cache,
            index,
        })
    }

    pub fn positions(&self, time: f64) -> Vec<VehiclePosition> {
        vehicle_positions_optimized(&self.index, time)
    }

    /// Hit testing over every stop with known coordinates
    pub fn stop_locator(&self) -> StopLocator {
        StopLocator::new(
            self.cache
                .stop_coords
                .iter()
                .map(|(id, point)| (id.clone(), *point)),
        )
    }
}

impl VehicleSource for Arc<PrecomputedFeed> {
    fn name(&self) -> &'static str {
        "precomputed"
    }

    fn vehicle_positions(&mut self, _feed: &GtfsFeed, time_seconds: f64) -> Vec<VehiclePosition> {
        self.positions(time_seconds)
    }
}

pub struct FeedSession {
    config: SimulationConfig,
    feed: Arc<GtfsFeed>,
    generation: u64,
    service_date: Option<NaiveDate>,
    active_services: Option<HashSet<ServiceIdentifier>>,
    precomputed: Option<Arc<PrecomputedFeed>>,
    legacy: LegacyPositionEngine,
}

impl FeedSession {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let legacy = LegacyPositionEngine::new(&config);
        Ok(Self {
            config,
            feed: Arc::new(GtfsFeed::default()),
            generation: 0,
            service_date: None,
            active_services: None,
            precomputed: None,
            legacy,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn feed(&self) -> &Arc<GtfsFeed> {
        &self.feed
    }

    pub fn stats(&self) -> FeedStats {
        self.feed.stats()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the loaded feed. Returns the new generation.
    pub fn reload(&mut self, feed: GtfsFeed) -> u64 {
        self.invalidate();
        self.feed = Arc::new(feed);
        self.refresh_services();

        let stats = self.feed.stats();
        info!(
            generation = self.generation,
            stops = stats.stop_count,
            routes = stats.route_count,
            trips = stats.trip_count,
            shapes = stats.shape_count,
            "Loaded feed"
        );
        self.generation
    }

    /// Only run trips of services active on `date`; `None` runs every trip.
    ///
    /// Installed precomputed data is dropped since its index no longer
    /// matches.
    pub fn set_service_date(&mut self, date: Option<NaiveDate>) {
        self.service_date = date;
        self.invalidate();
        self.refresh_services();
    }

    pub fn service_date(&self) -> Option<NaiveDate> {
        self.service_date
    }

    fn invalidate(&mut self) {
        self.precomputed = None;
        self.legacy.invalidate();
        self.generation += 1;
    }

    fn refresh_services(&mut self) {
        self.active_services = self
            .service_date
            .map(|date| active_services_on(&self.feed.calendar, &self.feed.calendar_dates, date));
        self.legacy.set_active_services(self.active_services.clone());
    }

    /// Precompute on the calling thread and install the result
    pub fn precompute(&mut self, progress: &dyn ProgressSink) -> Result<()> {
        let precomputed = PrecomputedFeed::build(
            &self.feed,
            &self.config,
            self.active_services.as_ref(),
            self.generation,
            progress,
        )?;
        self.install(precomputed)
    }

    /// Precompute the current feed on a background thread. Hand the result to
    /// [`FeedSession::install`] when it is done.
    pub fn spawn_precompute(&self) -> Result<PrecomputeHandle> {
        spawn_precompute(
            self.feed.clone(),
            self.config.clone(),
            self.active_services.clone(),
            self.generation,
        )
    }

    /// Publish a finished precomputation. Results for an older generation are
    /// rejected and the session keeps serving what it had.
    pub fn install(&mut self, precomputed: PrecomputedFeed) -> Result<()> {
        if precomputed.generation != self.generation {
            warn!(
                current = self.generation,
                found = precomputed.generation,
                "Discarding stale precomputation"
            );
            return Err(TransitError::StaleGeneration {
                current: self.generation,
                found: precomputed.generation,
            });
        }
        self.precomputed = Some(Arc::new(precomputed));
        Ok(())
    }

    pub fn precomputed(&self) -> Option<&Arc<PrecomputedFeed>> {
        self.precomputed.as_ref()
    }

    pub fn is_precomputed(&self) -> bool {
        self.precomputed.is_some()
    }

    /// The engine that serves queries right now
    pub fn source(&mut self) -> &mut dyn VehicleSource {
        match &mut self.precomputed {
            Some(precomputed) => precomputed,
            None => &mut self.legacy,
        }
    }

    /// Positions at `time` on the simulation clock, from the time index when
    /// available and from the raw timetable otherwise
    pub fn vehicle_positions(&mut self, time: f64) -> Vec<VehiclePosition> {
        let feed = self.feed.clone();
        self.source().vehicle_positions(&feed, time)
    }

    /// The precomputed trajectory of `trip_id`
    pub fn trajectory(&self, trip_id: &str) -> Result<&Arc<PrecomputedTrajectory>> {
        self.precomputed
            .as_ref()
            .and_then(|p| p.cache.get(trip_id))
            .ok_or_else(|| TransitError::TripNotFound(trip_id.into()))
    }
}
