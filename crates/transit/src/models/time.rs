//! GTFS clock times.
//!
//! Times are seconds since midnight of the service day. Per GTFS they may
//! exceed 24 hours for trips running past midnight (25:30:00 = 91800).

/// Length of the simulation clock, which wraps at midnight.
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Service days may run into the next day, but not past it
const MAX_HOURS: u32 = 48;

/// A raw time field as handed over by the parsing layer.
///
/// Loosely typed CSV readers turn `08:30:00` into text but may turn a field
/// such as `83000` into a number, which still means 8:30:00.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum TimeValue {
    Numeric(i64),
    Text(String),
}

impl From<&str> for TimeValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for TimeValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for TimeValue {
    fn from(n: i64) -> Self {
        Self::Numeric(n)
    }
}

/// Parse a GTFS time into seconds since midnight.
///
/// `None` means the time is unusable; callers exclude it from simulation.
pub fn parse_gtfs_time(value: &TimeValue) -> Option<u32> {
    match value {
        TimeValue::Text(text) => parse_text_time(text),
        TimeValue::Numeric(n) => parse_numeric_time(*n),
    }
}

/// Parse an optional time field, treating an absent field as unusable.
pub fn parse_optional_time(value: Option<&TimeValue>) -> Option<u32> {
    value.and_then(parse_gtfs_time)
}

fn parse_text_time(text: &str) -> Option<u32> {
    let mut parts = text.trim().split(':');
    let hours: u32 = parts.next()?.trim().parse().ok()?;
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    // Seconds are optional and fall back to 0 when missing or garbled.
    let seconds: u32 = parts
        .next()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);

    if hours >= MAX_HOURS || minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

fn parse_numeric_time(n: i64) -> Option<u32> {
    if n < 0 {
        return None;
    }
    // Read the digits as HHMMSS (or HMMSS), zero padded.
    let digits = format!("{:06}", n);
    let split = digits.len() - 4;
    let hours: u32 = digits[..split].parse().ok()?;
    let minutes: u32 = digits[split..split + 2].parse().ok()?;
    let seconds: u32 = digits[split + 2..].parse().ok()?;

    if hours >= MAX_HOURS || minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// Format seconds since midnight as `HH:MM:SS`. Hours are not wrapped.
pub fn format_gtfs_time(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Wrap any time into the simulation clock range [0, 86400).
pub fn wrap_day(seconds: f64) -> f64 {
    seconds.rem_euclid(SECONDS_PER_DAY as f64)
}
