use anyhow::{Context, Result};
use gtfs_replay_transit::GtfsFeed;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Load a GTFS feed from an unpacked folder of `.txt` files.
///
/// stops, trips and stop_times are required. Everything else is read when
/// present and left empty otherwise.
pub fn load_feed(dir: &Path) -> Result<GtfsFeed> {
    if !dir.is_dir() {
        anyhow::bail!("GTFS folder not found: {}", dir.display());
    }

    let feed = GtfsFeed {
        stops: read_required(dir, "stops.txt")?,
        routes: read_optional(dir, "routes.txt")?,
        trips: read_required(dir, "trips.txt")?,
        stop_times: read_required(dir, "stop_times.txt")?,
        shapes: read_optional(dir, "shapes.txt")?,
        frequencies: read_optional(dir, "frequencies.txt")?,
        calendar: read_optional(dir, "calendar.txt")?,
        calendar_dates: read_optional(dir, "calendar_dates.txt")?,
    };

    Ok(feed)
}

fn read_required<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>> {
    let path = dir.join(name);
    let file = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_records(file, name)
}

fn read_optional<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>> {
    let path = dir.join(name);
    if !path.exists() {
        tracing::debug!("  {} not present, skipping", name);
        return Ok(Vec::new());
    }
    let file = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_records(file, name)
}

fn read_records<T: DeserializeOwned, R: Read>(reader: R, name: &str) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for (row, rec) in reader.deserialize().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let rec: T = rec.with_context(|| format!("Failed to parse {} line {}", name, row + 2))?;
        records.push(rec);
    }

    tracing::info!("  {}: {} rows", name, records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_replay_transit::{GtfsCalendar, GtfsStop, GtfsStopTime, GtfsTrip, TimeValue};

    #[test]
    fn test_read_stops_ignores_extra_columns() {
        let data = "stop_id,stop_code,stop_name,stop_lat,stop_lon,wheelchair_boarding\n\
                    s1,101,Main St,40.5,-74.25,1\n\
                    s2,,  Oak Ave ,40.6,-74.3,\n";
        let stops: Vec<GtfsStop> = read_records(data.as_bytes(), "stops.txt").unwrap();

        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].stop_id.as_str(), "s1");
        assert_eq!(stops[0].stop_name.as_deref(), Some("Main St"));
        assert_eq!(stops[1].stop_name.as_deref(), Some("Oak Ave"));
        assert!((stops[1].stop_lon - -74.3).abs() < 1e-12);
    }

    #[test]
    fn test_read_stop_times_with_missing_times() {
        let data = "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
                    t1,08:00:00,08:00:00,s1,1\n\
                    t1,,,s2,2\n\
                    t1,25:10:00,,s3,3\n";
        let times: Vec<GtfsStopTime> = read_records(data.as_bytes(), "stop_times.txt").unwrap();

        assert_eq!(times.len(), 3);
        assert_eq!(times[0].arrival_time, Some(TimeValue::from("08:00:00")));
        assert_eq!(times[1].arrival_time, None);
        assert_eq!(times[1].departure_time, None);
        assert_eq!(times[2].arrival_time, Some(TimeValue::from("25:10:00")));
        assert_eq!(times[2].stop_sequence, 3);
    }

    #[test]
    fn test_optional_trip_columns() {
        let data = "route_id,service_id,trip_id\nr1,weekday,t1\n";
        let trips: Vec<GtfsTrip> = read_records(data.as_bytes(), "trips.txt").unwrap();

        assert_eq!(trips.len(), 1);
        assert!(trips[0].shape_id.is_none());
        assert!(trips[0].trip_headsign.is_none());
    }

    #[test]
    fn test_calendar_rows() {
        let data = "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
                    weekday,1,1,1,1,1,0,0,20240101,20241231\n";
        let calendar: Vec<GtfsCalendar> = read_records(data.as_bytes(), "calendar.txt").unwrap();

        assert_eq!(calendar[0].monday, 1);
        assert_eq!(calendar[0].sunday, 0);
        assert_eq!(calendar[0].end_date, "20241231");
    }

    #[test]
    fn test_bad_row_reports_line() {
        let data = "stop_id,stop_name,stop_lat,stop_lon\ns1,A,40.0,-74.0\ns2,B,north,-74.0\n";
        let err = read_records::<GtfsStop, _>(data.as_bytes(), "stops.txt").unwrap_err();
        assert!(err.to_string().contains("stops.txt line 3"));
    }

    #[test]
    fn test_missing_folder() {
        let err = load_feed(Path::new("/nonexistent/gtfs/folder")).unwrap_err();
        assert!(err.to_string().contains("GTFS folder not found"));
    }
}
