//! Tuning knobs for precomputation and indexing.

use crate::models::types::{Result, TransitError, DEFAULT_ROUTE_COLOR};

/// Configuration for trajectory precomputation and the time index
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationConfig {
    /// Width of one time bucket in seconds (default: 300)
    pub bucket_size_secs: u32,
    /// Stops further than this from every shape point are considered
    /// unmapped (default: 500 m)
    pub max_snap_distance_m: f64,
    /// Color for routes without `route_color` (default: #3388ff)
    pub default_route_color: String,
    /// The nearest-point scan stops once the distance grows past this multiple
    /// of the best distance seen... (default: 3.0)
    pub snap_exit_factor: f64,
    /// ...and at least this many points were scanned past the best one
    /// (default: 10)
    pub snap_exit_min_points: usize,
    /// Report progress every N shapes (default: 100)
    pub shape_progress_every: usize,
    /// Report progress every N trajectories (default: 500)
    pub trip_progress_every: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            bucket_size_secs: 300,
            max_snap_distance_m: 500.0,
            default_route_color: DEFAULT_ROUTE_COLOR.to_string(),
            snap_exit_factor: 3.0,
            snap_exit_min_points: 10,
            shape_progress_every: 100,
            trip_progress_every: 500,
        }
    }
}

impl SimulationConfig {
    /// Reject settings that break the engine's contracts
    pub fn validate(&self) -> Result<()> {
        if self.bucket_size_secs == 0 {
            return Err(TransitError::InvalidConfig(
                "bucket_size_secs must be positive".into(),
            ));
        }
        if !(self.max_snap_distance_m.is_finite() && self.max_snap_distance_m > 0.0) {
            return Err(TransitError::InvalidConfig(format!(
                "max_snap_distance_m must be a positive number, got {}",
                self.max_snap_distance_m
            )));
        }
        if !(self.snap_exit_factor.is_finite() && self.snap_exit_factor >= 1.0) {
            return Err(TransitError::InvalidConfig(format!(
                "snap_exit_factor must be at least 1, got {}",
                self.snap_exit_factor
            )));
        }
        Ok(())
    }
}
