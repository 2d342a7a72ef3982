//! Output types and errors shared across the engine.

use std::sync::Arc;

use geo::Point;

use crate::identifiers::*;

// ============================================================================
// Vehicle output
// ============================================================================

/// Where one vehicle instance is at a simulated instant.
///
/// Ephemeral: recomputed for every query and never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct VehiclePosition {
    /// Unique per instance (`trip` or `trip_n` for frequency repetitions)
    pub trip_id: InstanceIdentifier,
    pub route_id: RouteIdentifier,
    /// x = longitude, y = latitude
    pub position: Point,
    /// Degrees clockwise from north, [0, 360)
    pub bearing: f64,
    pub next_stop_id: StopIdentifier,
    /// Fraction of the whole trip covered, 0..=1
    pub progress: f64,
    /// Fraction of the current stop-to-stop leg covered, 0..=1
    pub segment_progress: f64,
    pub color: Arc<str>,
    pub headsign: Option<Arc<str>>,
}

// ============================================================================
// Route colors
// ============================================================================

pub const DEFAULT_ROUTE_COLOR: &str = "#3388ff";

/// Normalize a GTFS `route_color` into a CSS hex color.
///
/// Adds the leading `#` when missing and falls back to `default` when the
/// route has no color.
pub fn resolve_route_color(route_color: Option<&str>, default: &str) -> String {
    match route_color.map(str::trim) {
        Some(color) if !color.is_empty() => {
            if color.starts_with('#') {
                color.to_string()
            } else {
                format!("#{}", color)
            }
        }
        _ => default.to_string(),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Trip not found: {0}")]
    TripNotFound(TripIdentifier),

    #[error("Precomputation worker failed: {0}")]
    WorkerFailed(String),

    #[error("Precomputed data is for feed generation {found}, current is {current}")]
    StaleGeneration { current: u64, found: u64 },
}

pub type Result<T> = std::result::Result<T, TransitError>;
