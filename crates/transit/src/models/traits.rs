//! Core traits for position engines.
//!
//! Callers drive whichever engine is available through this trait and never
//! need to know whether positions came from precomputed trajectories or from
//! straight lines between stops.

use crate::models::records::GtfsFeed;
use crate::models::types::VehiclePosition;

/// Anything that can place vehicles on the map for a simulated instant
pub trait VehicleSource {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Positions of every vehicle running at `time_seconds` on the simulation
    /// clock. `feed` is the currently loaded feed; engines with their own
    /// precomputed state may ignore it.
    fn vehicle_positions(&mut self, feed: &GtfsFeed, time_seconds: f64) -> Vec<VehiclePosition>;
}
