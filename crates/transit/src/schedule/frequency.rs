//! Headway-based service windows from frequencies.txt.

use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, warn};

use crate::identifiers::TripIdentifier;
use crate::models::records::GtfsFrequency;
use crate::models::time::parse_gtfs_time;

/// One frequencies.txt row with parsed times.
///
/// Departures are `start + k * headway` for every `k` with a departure
/// strictly before `end`. `first_instance` numbers the window's first
/// departure so numbering continues across a trip's windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrequencyWindow {
    pub start: u32,
    pub end: u32,
    pub headway: u32,
    pub first_instance: u32,
}

impl FrequencyWindow {
    pub fn new(start: u32, end: u32, headway: u32) -> Self {
        Self {
            start,
            end,
            headway,
            first_instance: 0,
        }
    }

    pub fn instance_count(&self) -> u32 {
        if self.headway == 0 || self.end <= self.start {
            return 0;
        }
        (self.end - self.start).div_ceil(self.headway)
    }

    /// `(instance number, departure)` for every departure in the window
    pub fn departures(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.instance_count()).map(move |k| (self.first_instance + k, self.start + k * self.headway))
    }

    /// Window-local indices `k` of departures with `dep_k <= time <= dep_k + duration`.
    ///
    /// Computed directly from `time`, without walking the window.
    pub fn active_at(&self, time: f64, duration: u32) -> Range<u32> {
        let count = self.instance_count();
        if count == 0 || time < self.start as f64 {
            return 0..0;
        }

        let headway = self.headway as f64;
        let since_start = time - self.start as f64;
        let last = ((since_start / headway).floor() as u64).min(count as u64 - 1) as u32;
        let first = ((since_start - duration as f64) / headway).ceil().max(0.0) as u32;

        if first > last {
            0..0
        } else {
            first..last + 1
        }
    }
}

/// Valid frequency windows grouped by trip, sorted by start time, with
/// instance numbers running on from one window to the next.
///
/// Rows with an unparseable time, a zero headway, or an end before their
/// start are dropped.
pub fn frequency_windows(frequencies: &[GtfsFrequency]) -> HashMap<&TripIdentifier, Vec<FrequencyWindow>> {
    let mut by_trip: HashMap<&TripIdentifier, Vec<FrequencyWindow>> = HashMap::new();

    for freq in frequencies {
        let (Some(start), Some(end)) = (parse_gtfs_time(&freq.start_time), parse_gtfs_time(&freq.end_time)) else {
            debug!(trip_id = %freq.trip_id, "Skipping frequency with bad times");
            continue;
        };
        if freq.headway_secs == 0 || end < start {
            warn!(trip_id = %freq.trip_id, start, end, headway = freq.headway_secs, "Skipping empty frequency");
            continue;
        }

        by_trip
            .entry(&freq.trip_id)
            .or_default()
            .push(FrequencyWindow::new(start, end, freq.headway_secs));
    }

    for windows in by_trip.values_mut() {
        windows.sort_by_key(|w| w.start);
        let mut next = 0;
        for window in windows.iter_mut() {
            window.first_instance = next;
            next += window.instance_count();
        }
    }

    by_trip
}
