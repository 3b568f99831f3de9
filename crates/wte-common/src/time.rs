//! Time-of-day and signed span arithmetic.
//!
//! Staging discards dates from transport timestamps, so windows are plain
//! clock times and durations are signed spans between two clock times. A
//! span may be negative when completion precedes release; it is never
//! clamped.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;

/// Display layout for staged dates.
pub const DATE_DISPLAY_FORMAT: &str = "%d/%m/%Y";

/// A time of day with second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClockTime(pub NaiveTime);

impl ClockTime {
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, second).map(ClockTime)
    }

    /// Parse `HH:MM:SS`.
    pub fn parse(raw: &str) -> Result<Self, chrono::ParseError> {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S").map(ClockTime)
    }

    /// Parse the clock time held in the trailing eight characters of a raw
    /// timestamp such as `15.01.2026 08:30:00`.
    ///
    /// Returns `Ok(None)` for an empty field.
    pub fn from_trailing(raw: &str) -> Result<Option<Self>, chrono::ParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let chars: Vec<char> = trimmed.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(8)..].iter().collect();
        Self::parse(&tail).map(Some)
    }

    /// Milliseconds since midnight.
    pub fn millis_from_midnight(&self) -> i64 {
        i64::from(self.0.num_seconds_from_midnight()) * MILLIS_PER_SECOND
    }

    /// Whether this time lies within `[start, end]`, both ends inclusive.
    pub fn within(&self, start: ClockTime, end: ClockTime) -> bool {
        *self >= start && *self <= end
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

/// Signed span between two clock times, millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Span {
    millis: i64,
}

impl Span {
    pub fn from_millis(millis: i64) -> Self {
        Span { millis }
    }

    /// `end - start`, negative when `end` precedes `start`.
    pub fn between(start: ClockTime, end: ClockTime) -> Self {
        Span::from_millis(end.millis_from_midnight() - start.millis_from_midnight())
    }

    pub fn millis(&self) -> i64 {
        self.millis
    }

    pub fn is_zero(&self) -> bool {
        self.millis == 0
    }

    /// `hours * 60 + minutes + seconds / 60`, carrying the sign.
    pub fn total_minutes(&self) -> f64 {
        let abs = self.millis.abs();
        let hours = (abs / MILLIS_PER_HOUR) as f64;
        let minutes = ((abs % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE) as f64;
        let seconds = (abs % MILLIS_PER_MINUTE) as f64 / MILLIS_PER_SECOND as f64;
        let total = hours * 60.0 + minutes + seconds / 60.0;
        if self.millis < 0 {
            -total
        } else {
            total
        }
    }

    /// Divide the span by a count. `None` for a zero or non-finite divisor.
    pub fn divide(&self, divisor: f64) -> Option<Span> {
        if divisor == 0.0 || !divisor.is_finite() {
            return None;
        }
        let millis = (self.millis as f64 / divisor).round();
        Some(Span::from_millis(millis as i64))
    }

    /// Parse the `[-]HH:MM:SS[.mmm]` layout produced by `Display`.
    pub fn parse(raw: &str) -> Option<Span> {
        let trimmed = raw.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let mut parts = body.splitn(3, ':');
        let hours: i64 = parts.next()?.parse().ok()?;
        let minutes: i64 = parts.next()?.parse().ok()?;
        let seconds_part = parts.next()?;
        let (secs, millis) = match seconds_part.split_once('.') {
            Some((s, ms)) if ms.len() == 3 => (s.parse::<i64>().ok()?, ms.parse::<i64>().ok()?),
            Some(_) => return None,
            None => (seconds_part.parse::<i64>().ok()?, 0),
        };
        if !(0..60).contains(&minutes) || !(0..60).contains(&secs) {
            return None;
        }
        let total = hours * MILLIS_PER_HOUR
            + minutes * MILLIS_PER_MINUTE
            + secs * MILLIS_PER_SECOND
            + millis;
        Some(Span::from_millis(if negative { -total } else { total }))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.millis.abs();
        let sign = if self.millis < 0 { "-" } else { "" };
        let hours = abs / MILLIS_PER_HOUR;
        let minutes = (abs % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE;
        let seconds = (abs % MILLIS_PER_MINUTE) / MILLIS_PER_SECOND;
        let millis = abs % MILLIS_PER_SECOND;
        if millis == 0 {
            write!(f, "{sign}{hours:02}:{minutes:02}:{seconds:02}")
        } else {
            write!(f, "{sign}{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
        }
    }
}

/// Parse a date code laid out as `dd?mm?yyyy…`: day from characters 1-2,
/// month from 4-5 and year from 7-10. Separators and any trailing text are
/// ignored.
pub fn parse_date_code(code: &str) -> Option<NaiveDate> {
    let chars: Vec<char> = code.trim().chars().collect();
    if chars.len() < 10 {
        return None;
    }
    let day: u32 = chars[0..2].iter().collect::<String>().parse().ok()?;
    let month: u32 = chars[3..5].iter().collect::<String>().parse().ok()?;
    let year: i32 = chars[6..10].iter().collect::<String>().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Format a date as `dd/mm/yyyy`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_DISPLAY_FORMAT).to_string()
}

/// Parse a `dd/mm/yyyy` date as written by [`format_date`].
pub fn parse_display_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_DISPLAY_FORMAT).ok()
}
