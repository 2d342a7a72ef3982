//! Which services run on a given date, from calendar.txt and calendar_dates.txt.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{HashMap, HashSet};

use crate::identifiers::ServiceIdentifier;
use crate::models::records::{GtfsCalendar, GtfsCalendarDate};
use crate::models::types::{Result, TransitError};

/// One service's operating days: a weekly pattern inside a date range, with
/// per-date overrides from calendar_dates.txt taking precedence.
#[derive(Clone, Debug)]
pub struct ServiceCalendar {
    pub service_id: ServiceIdentifier,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weekdays: WeekdayFlags,
    pub exceptions: HashMap<NaiveDate, ServiceException>,
}

/// calendar_dates.txt `exception_type`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceException {
    /// 1
    Added,
    /// 2
    Removed,
}

impl ServiceException {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Added),
            2 => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Bit per weekday, Monday in bit 1
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeekdayFlags(u8);

impl WeekdayFlags {
    pub fn set(&mut self, weekday: Weekday) {
        self.0 |= 1 << weekday.number_from_monday();
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.0 & (1 << weekday.number_from_monday()) != 0
    }

    pub fn from_record(record: &GtfsCalendar) -> Self {
        let columns = [
            record.monday,
            record.tuesday,
            record.wednesday,
            record.thursday,
            record.friday,
            record.saturday,
            record.sunday,
        ];
        let mut weekday = Weekday::Mon;
        let mut flags = Self::default();
        for column in columns {
            if column == 1 {
                flags.set(weekday);
            }
            weekday = weekday.succ();
        }
        flags
    }
}

/// Parse a GTFS `YYYYMMDD` date
pub fn parse_gtfs_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d")
        .map_err(|err| TransitError::InvalidData(format!("bad GTFS date {:?}: {}", value, err)))
}

impl ServiceCalendar {
    /// Build one service from its calendar.txt row and every calendar_dates.txt row
    /// that mentions it.
    pub fn from_records(record: &GtfsCalendar, exceptions: &[GtfsCalendarDate]) -> Result<Self> {
        Ok(Self {
            service_id: record.service_id.clone(),
            start_date: parse_gtfs_date(&record.start_date)?,
            end_date: parse_gtfs_date(&record.end_date)?,
            weekdays: WeekdayFlags::from_record(record),
            exceptions: collect_exceptions(&record.service_id, exceptions)?,
        })
    }

    pub fn runs_on(&self, date: NaiveDate) -> bool {
        match self.exceptions.get(&date) {
            Some(ServiceException::Added) => true,
            Some(ServiceException::Removed) => false,
            None => {
                (self.start_date..=self.end_date).contains(&date)
                    && self.weekdays.contains(date.weekday())
            }
        }
    }
}

fn collect_exceptions(
    service_id: &ServiceIdentifier,
    rows: &[GtfsCalendarDate],
) -> Result<HashMap<NaiveDate, ServiceException>> {
    let mut exceptions = HashMap::new();
    for row in rows.iter().filter(|row| &row.service_id == service_id) {
        let date = parse_gtfs_date(&row.date)?;
        match ServiceException::from_code(row.exception_type) {
            Some(exception) => {
                exceptions.insert(date, exception);
            }
            None => {
                tracing::warn!(%service_id, exception_type = row.exception_type, "Ignoring unknown calendar exception type");
            }
        }
    }
    Ok(exceptions)
}

/// Every service running on `date`, including services that only appear in
/// calendar_dates.txt.
///
/// Rows with malformed dates are skipped with a warning rather than failing the
/// whole feed.
pub fn active_services_on(
    calendars: &[GtfsCalendar],
    calendar_dates: &[GtfsCalendarDate],
    date: NaiveDate,
) -> HashSet<ServiceIdentifier> {
    let mut active = HashSet::new();
    let mut by_service: HashMap<&ServiceIdentifier, Vec<GtfsCalendarDate>> = HashMap::new();
    for exception in calendar_dates {
        by_service
            .entry(&exception.service_id)
            .or_default()
            .push(exception.clone());
    }

    for record in calendars {
        let exceptions = by_service.remove(&record.service_id).unwrap_or_default();
        match ServiceCalendar::from_records(record, &exceptions) {
            Ok(calendar) if calendar.runs_on(date) => {
                active.insert(record.service_id.clone());
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(service_id = %record.service_id, "Skipping service: {}", err);
            }
        }
    }

    // Services defined only through exceptions
    for (service_id, exceptions) in by_service {
        let runs = exceptions.iter().any(|e| {
            e.exception_type == 1 && parse_gtfs_date(&e.date).map_or(false, |d| d == date)
        });
        if runs {
            active.insert(service_id.clone());
        }
    }

    active
}
