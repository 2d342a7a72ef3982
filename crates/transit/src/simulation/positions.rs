//! Per-frame position query over the time index.

use crate::models::time::SECONDS_PER_DAY;
use crate::models::types::VehiclePosition;
use crate::schedule::{ActiveVehicleInstance, TimeIndexedVehicles};
use crate::trajectory::interpolate_on_trajectory;

/// Positions of every vehicle running at `time` (seconds on the simulation
/// clock, `[0, 86400)`).
///
/// Scans the bucket holding `time` and its two neighbours. Instances past
/// midnight of the service day are found by also querying `time + 86400`.
pub fn vehicle_positions_optimized(index: &TimeIndexedVehicles, time: f64) -> Vec<VehiclePosition> {
    let mut positions = Vec::new();
    collect_positions(index, time, None, &mut positions);

    let next_day = time + SECONDS_PER_DAY as f64;
    if index.latest_end() as f64 >= next_day {
        collect_positions(index, next_day, Some(time), &mut positions);
    }

    positions
}

/// Append positions for instances active at `time`, skipping those already
/// active at `already_seen`.
fn collect_positions(
    index: &TimeIndexedVehicles,
    time: f64,
    already_seen: Option<f64>,
    out: &mut Vec<VehiclePosition>,
) {
    let current = index.bucket_of(time);
    let first = current.saturating_sub(1);

    for bucket in first..=current.saturating_add(1) {
        for instance in index.bucket(bucket) {
            // An instance sits in every bucket of its span; only the first
            // scanned one reports it.
            let start_bucket = instance.start_time / index.bucket_size();
            if bucket != start_bucket.max(first) {
                continue;
            }
            if !instance.is_active_at(time) || already_seen.is_some_and(|t| instance.is_active_at(t)) {
                continue;
            }
            if let Some(position) = position_of(instance, time) {
                out.push(position);
            }
        }
    }
}

pub(crate) fn position_of(instance: &ActiveVehicleInstance, time: f64) -> Option<VehiclePosition> {
    let elapsed = time - instance.start_time as f64;
    let result = interpolate_on_trajectory(&instance.trajectory, elapsed)?;

    Some(VehiclePosition {
        trip_id: instance.instance_id.clone(),
        route_id: instance.route_id.clone(),
        position: result.position,
        bearing: result.bearing,
        next_stop_id: result.next_stop_id.clone(),
        progress: result.progress,
        segment_progress: result.segment_progress,
        color: instance.color.clone(),
        headsign: instance.headsign.clone(),
    })
}
