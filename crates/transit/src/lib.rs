//! # gtfs-replay-transit
//!
//! Replays a static GTFS timetable as moving vehicles.
//!
//! ## Features
//!
//! - **Trajectory precomputation**: every trip becomes a list of timed
//!   stop-to-stop legs that follow the route shape, computed once per feed
//! - **Time index**: trip runs (including headway-based repetitions) bucketed
//!   by time, so a frame only looks at vehicles that can be running
//! - **Fallback engine**: straight-line positions straight from stop_times
//!   while precomputation is still running
//! - **Background worker**: precompute on a thread with a progress stream
//! - **Spatial queries**: R-tree hit testing for stops and vehicles
//!
//! ## Example
//!
//! ```
//! use gtfs_replay_transit::prelude::*;
//!
//! let stop = |id: &str, lat: f64| GtfsStop {
//!     stop_id: StopIdentifier::new(id),
//!     stop_name: None,
//!     stop_lat: lat,
//!     stop_lon: 0.0,
//! };
//! let visit = |id: &str, seq: u32, time: &str| GtfsStopTime {
//!     trip_id: TripIdentifier::new("t1"),
//!     arrival_time: Some(time.into()),
//!     departure_time: Some(time.into()),
//!     stop_id: StopIdentifier::new(id),
//!     stop_sequence: seq,
//! };
//!
//! let feed = GtfsFeed {
//!     stops: vec![stop("a", 0.0), stop("b", 1.0), stop("c", 2.0)],
//!     trips: vec![GtfsTrip {
//!         route_id: RouteIdentifier::new("r1"),
//!         service_id: ServiceIdentifier::new("daily"),
//!         trip_id: TripIdentifier::new("t1"),
//!         shape_id: None,
//!         trip_headsign: None,
//!     }],
//!     stop_times: vec![
//!         visit("a", 1, "08:00:00"),
//!         visit("b", 2, "08:10:00"),
//!         visit("c", 3, "08:20:00"),
//!     ],
//!     ..GtfsFeed::default()
//! };
//!
//! let mut session = FeedSession::new(SimulationConfig::default())?;
//! session.reload(feed);
//! session.precompute(&NoProgress)?;
//!
//! // 08:05, halfway between the first two stops
//! let vehicles = session.vehicle_positions(8.0 * 3600.0 + 300.0);
//! assert_eq!(vehicles.len(), 1);
//! assert_eq!(vehicles[0].next_stop_id.as_str(), "b");
//! assert!((vehicles[0].position.y() - 0.5).abs() < 1e-9);
//! # Ok::<(), TransitError>(())
//! ```

pub mod config;
pub mod identifiers;
pub mod models;
pub mod progress;
pub mod schedule;
pub mod simulation;
pub mod spatial;
pub mod trajectory;

// Re-exports for convenience
pub mod prelude {
    pub use crate::config::SimulationConfig;
    pub use crate::identifiers::*;
    pub use crate::models::{calendar::*, records::*, time::*, traits::*, types::*};
    pub use crate::progress::{NoProgress, Progress, ProgressSink, Stage};
    pub use crate::schedule::{build_time_index, ActiveVehicleInstance, TimeIndexedVehicles};
    pub use crate::simulation::{
        vehicle_positions_optimized, FeedSession, LegacyPositionEngine, PrecomputeHandle,
        PrecomputedFeed, SimulationClock,
    };
    pub use crate::spatial::{StopLocator, VehicleLocator};
    pub use crate::trajectory::{
        interpolate_on_trajectory, precompute_trajectories, PrecomputedTrajectory, TrajectoryCache,
    };
}

pub use prelude::*;
