//! Transit data models, types, and traits.

pub mod calendar;
pub mod records;
pub mod time;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use calendar::{active_services_on, parse_gtfs_date, ServiceCalendar, WeekdayFlags};
pub use records::{
    FeedStats, GtfsCalendar, GtfsCalendarDate, GtfsFeed, GtfsFrequency, GtfsRoute, GtfsShape,
    GtfsStop, GtfsStopTime, GtfsTrip,
};
pub use time::{
    format_gtfs_time, parse_gtfs_time, parse_optional_time, wrap_day, TimeValue, SECONDS_PER_DAY,
};
pub use traits::VehicleSource;
pub use types::{resolve_route_color, Result, TransitError, VehiclePosition, DEFAULT_ROUTE_COLOR};
