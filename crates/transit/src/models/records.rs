//! Parsed GTFS rows, as handed over by the ingestion layer.
//!
//! These are plain in-memory collections. Nothing here is validated; the
//! precomputation pass decides what can be simulated.

use std::collections::HashSet;

use crate::identifiers::*;
use crate::models::time::TimeValue;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct GtfsStop {
    pub stop_id: StopIdentifier,
    #[cfg_attr(feature = "serde", serde(default))]
    pub stop_name: Option<String>,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct GtfsRoute {
    pub route_id: RouteIdentifier,
    #[cfg_attr(feature = "serde", serde(default))]
    pub route_short_name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub route_long_name: Option<String>,
    /// Hex RGB, with or without a leading `#`
    #[cfg_attr(feature = "serde", serde(default))]
    pub route_color: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct GtfsTrip {
    pub route_id: RouteIdentifier,
    pub service_id: ServiceIdentifier,
    pub trip_id: TripIdentifier,
    #[cfg_attr(feature = "serde", serde(default))]
    pub shape_id: Option<ShapeIdentifier>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub trip_headsign: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct GtfsStopTime {
    pub trip_id: TripIdentifier,
    #[cfg_attr(feature = "serde", serde(default))]
    pub arrival_time: Option<TimeValue>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub departure_time: Option<TimeValue>,
    pub stop_id: StopIdentifier,
    pub stop_sequence: u32,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct GtfsShape {
    pub shape_id: ShapeIdentifier,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub shape_dist_traveled: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct GtfsFrequency {
    pub trip_id: TripIdentifier,
    pub start_time: TimeValue,
    pub end_time: TimeValue,
    pub headway_secs: u32,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct GtfsCalendar {
    pub service_id: ServiceIdentifier,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    /// `YYYYMMDD`
    pub start_date: String,
    /// `YYYYMMDD`
    pub end_date: String,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct GtfsCalendarDate {
    pub service_id: ServiceIdentifier,
    /// `YYYYMMDD`
    pub date: String,
    /// 1 = service added, 2 = service removed
    pub exception_type: u8,
}

/// One loaded feed. Replaced wholesale on reload, never edited in place.
#[derive(Clone, Debug, Default)]
pub struct GtfsFeed {
    pub stops: Vec<GtfsStop>,
    pub routes: Vec<GtfsRoute>,
    pub trips: Vec<GtfsTrip>,
    pub stop_times: Vec<GtfsStopTime>,
    pub shapes: Vec<GtfsShape>,
    pub frequencies: Vec<GtfsFrequency>,
    pub calendar: Vec<GtfsCalendar>,
    pub calendar_dates: Vec<GtfsCalendarDate>,
}

/// Summary counts shown after a feed loads
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub stop_count: usize,
    pub route_count: usize,
    pub trip_count: usize,
    pub shape_count: usize,
}

impl GtfsFeed {
    pub fn stats(&self) -> FeedStats {
        let shape_ids: HashSet<&str> = self.shapes.iter().map(|s| s.shape_id.as_str()).collect();
        FeedStats {
            stop_count: self.stops.len(),
            route_count: self.routes.len(),
            trip_count: self.trips.len(),
            shape_count: shape_ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty() && self.trips.is_empty() && self.stop_times.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape_point(id: &str, seq: u32) -> GtfsShape {
        GtfsShape {
            shape_id: ShapeIdentifier::new(id),
            shape_pt_lat: 0.0,
            shape_pt_lon: seq as f64 * 0.001,
            shape_pt_sequence: seq,
            shape_dist_traveled: None,
        }
    }

    #[test]
    fn test_feed_stats_counts_distinct_shapes() {
        let feed = GtfsFeed {
            shapes: vec![shape_point("a", 1), shape_point("a", 2), shape_point("b", 1)],
            stops: vec![GtfsStop {
                stop_id: StopIdentifier::new("s1"),
                stop_name: Some("Main St".into()),
                stop_lat: 40.0,
                stop_lon: -74.0,
            }],
            ..Default::default()
        };

        let stats = feed.stats();
        assert_eq!(stats.shape_count, 2);
        assert_eq!(stats.stop_count, 1);
        assert_eq!(stats.trip_count, 0);
        assert!(!feed.is_empty());
        assert!(GtfsFeed::default().is_empty());
    }
}
