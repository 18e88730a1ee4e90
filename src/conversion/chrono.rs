//! chrono type implementations.
//!
//! Text forms follow the server's default `ISO` DateStyle:
//! `2024-01-15`, `10:30:00.123`, `2024-01-15 10:30:00.123` and, for
//! `timestamptz`, `2024-01-15 10:30:00.123+05:30`.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::Result;

use super::{FromText, invalid, text};

const DATE: &str = "%Y-%m-%d";
const DATETIME: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATETIME_TZ: &str = "%Y-%m-%d %H:%M:%S%.f%#z";

impl FromText<'_> for NaiveDate {
    fn from_text(bytes: &[u8]) -> Result<Self> {
        NaiveDate::parse_from_str(text(bytes)?, DATE).map_err(|e| invalid("date", bytes, e))
    }
}

impl FromText<'_> for NaiveTime {
    fn from_text(bytes: &[u8]) -> Result<Self> {
        NaiveTime::parse_from_str(text(bytes)?, "%H:%M:%S%.f")
            .map_err(|e| invalid("time", bytes, e))
    }
}

/// Accepts `timestamp`, `timestamptz` (converted to UTC) and `date` (midnight).
impl FromText<'_> for NaiveDateTime {
    fn from_text(bytes: &[u8]) -> Result<Self> {
        let s = text(bytes)?;
        if s.len() == DATE_LEN {
            return NaiveDate::parse_from_str(s, DATE)
                .map(|date| date.and_time(NaiveTime::MIN))
                .map_err(|e| invalid("timestamp", bytes, e));
        }
        if has_offset(s) {
            return DateTime::<FixedOffset>::parse_from_str(s, DATETIME_TZ)
                .map(|dt| dt.naive_utc())
                .map_err(|e| invalid("timestamp", bytes, e));
        }
        NaiveDateTime::parse_from_str(s, DATETIME).map_err(|e| invalid("timestamp", bytes, e))
    }
}

impl FromText<'_> for DateTime<Utc> {
    fn from_text(bytes: &[u8]) -> Result<Self> {
        NaiveDateTime::from_text(bytes).map(|naive| naive.and_utc())
    }
}

/// Length of `YYYY-MM-DD`.
const DATE_LEN: usize = 10;

/// True if a sign appears after the date part, i.e. a UTC offset is present.
fn has_offset(s: &str) -> bool {
    s.get(DATE_LEN..)
        .is_some_and(|time| time.contains(['+', '-']))
}
