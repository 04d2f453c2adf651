//! Wall-clock time-of-day handling for recording windows.
//!
//! Start and stop times travel as `HH:MM` strings (tolerant of a 1-digit
//! hour and optional seconds) and are interpreted in the request's IANA
//! timezone.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::types::ClockFormat;

/// Error type for time-of-day parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    /// Input was empty or whitespace
    Empty,
    /// Input did not match any accepted layout
    InvalidFormat(String),
    /// A component was outside its valid range
    OutOfRange(String),
    /// Timezone name is not a known IANA zone
    UnknownTimezone(String),
}

impl std::fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeParseError::Empty => write!(f, "Time is empty"),
            TimeParseError::InvalidFormat(s) => {
                write!(f, "Invalid time '{}' (expected HH:MM or H:MM)", s)
            }
            TimeParseError::OutOfRange(s) => write!(f, "Time out of range: {}", s),
            TimeParseError::UnknownTimezone(s) => write!(f, "Unknown timezone: {}", s),
        }
    }
}

impl std::error::Error for TimeParseError {}

/// A wall-clock time of day, without date or zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
    #[serde(default)]
    pub second: u32,
}

impl TimeOfDay {
    /// Create a time of day, validating ranges.
    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self, TimeParseError> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(TimeParseError::OutOfRange(format!(
                "{:02}:{:02}:{:02}",
                hour, minute, second
            )));
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    /// Parse a time string according to the configured clock format.
    ///
    /// With the 12-hour clock, `hh:mm AM/PM` is tried first. Both formats
    /// fall back to the flexible 24-hour layout `H:MM[:SS]`.
    pub fn parse(text: &str, clock: ClockFormat) -> Result<Self, TimeParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TimeParseError::Empty);
        }

        if clock == ClockFormat::TwelveHour {
            for layout in ["%I:%M %p", "%I:%M:%S %p"] {
                if let Ok(t) = NaiveTime::parse_from_str(text, layout) {
                    return Ok(Self::from(t));
                }
            }
        }

        Self::parse_flexible(text)
    }

    fn parse_flexible(text: &str) -> Result<Self, TimeParseError> {
        let invalid = || TimeParseError::InvalidFormat(text.to_string());
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid());
        }

        let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        let hour_part = parts[0];
        if !all_digits(hour_part) || hour_part.len() > 2 {
            return Err(invalid());
        }
        for part in &parts[1..] {
            if !all_digits(part) || part.len() != 2 {
                return Err(invalid());
            }
        }

        let hour: u32 = hour_part.parse().map_err(|_| invalid())?;
        let minute: u32 = parts[1].parse().map_err(|_| invalid())?;
        let second: u32 = match parts.get(2) {
            Some(s) => s.parse().map_err(|_| invalid())?,
            None => 0,
        };
        Self::new(hour, minute, second)
    }

    /// Compact form used in file names: `HHMM`, or `HHMMSS` when seconds are set.
    pub fn compact(&self) -> String {
        if self.second == 0 {
            format!("{:02}{:02}", self.hour, self.minute)
        } else {
            format!("{:02}{:02}{:02}", self.hour, self.minute, self.second)
        }
    }

    fn naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, self.second).unwrap_or(NaiveTime::MIN)
    }

    /// This time of day on `date` in `tz`.
    ///
    /// Times that fall in a DST gap resolve to the first valid minute after
    /// the gap; ambiguous times resolve to the earlier instant.
    pub fn on_date(&self, date: NaiveDate, tz: Tz) -> DateTime<Tz> {
        let mut naive = date.and_time(self.naive());
        // Gaps are at most a couple of hours in practice.
        for _ in 0..(4 * 60) {
            if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
                return dt;
            }
            naive += Duration::minutes(1);
        }
        tz.from_utc_datetime(&date.and_time(self.naive()))
    }

    /// Today's occurrence of this time in `tz`. May lie in the past.
    pub fn start_instant(&self, tz: Tz, now: DateTime<Utc>) -> DateTime<Tz> {
        let today = now.with_timezone(&tz).date_naive();
        self.on_date(today, tz)
    }

    /// Today's occurrence of this time as a stop instant. Never rolls over,
    /// so a stop time already behind `now` yields an instant in the past.
    pub fn stop_instant(&self, tz: Tz, now: DateTime<Utc>) -> DateTime<Tz> {
        self.start_instant(tz, now)
    }

    /// The next occurrence of this time in `tz` strictly after `now`.
    ///
    /// Today's occurrence if it is still ahead, otherwise tomorrow's. Only the
    /// watchdog rolls over.
    pub fn stop_boundary(&self, tz: Tz, now: DateTime<Utc>) -> DateTime<Tz> {
        let today = now.with_timezone(&tz).date_naive();
        let candidate = self.on_date(today, tz);
        if candidate.with_timezone(&Utc) > now {
            return candidate;
        }
        match today.succ_opt() {
            Some(tomorrow) => self.on_date(tomorrow, tz),
            None => candidate,
        }
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(t: NaiveTime) -> Self {
        use chrono::Timelike;
        Self {
            hour: t.hour(),
            minute: t.minute(),
            second: t.second(),
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.second == 0 {
            write!(f, "{:02}:{:02}", self.hour, self.minute)
        } else {
            write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
        }
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, TimeParseError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TimeParseError::UnknownTimezone(name.to_string()))
}
