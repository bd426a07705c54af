use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// A calendar day. No time of day, no timezone: two `Day`s compare exactly
/// like their `YYYY-MM-DD` spellings do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Day(NaiveDate);

impl Day {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Day)
    }

    /// Parse a `YYYY-MM-DD` string. A longer ISO timestamp is cut at `T` first,
    /// so `2024-03-01T23:30:00-05:00` is the 1st of March regardless of offset.
    pub fn parse(s: &str) -> Result<Self, DateError> {
        let date_part = s.trim().split('T').next().unwrap_or_default();
        let bytes = date_part.as_bytes();
        let well_formed = bytes.len() == 10
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| if i == 4 || i == 7 { *b == b'-' } else { b.is_ascii_digit() });
        if !well_formed {
            return Err(DateError::Malformed(s.to_string()));
        }
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map(Day)
            .map_err(|_| DateError::NoSuchDay(date_part.to_string()))
    }

    /// Shift by a signed number of days. `None` past the representable calendar.
    pub fn add_days(self, days: i64) -> Option<Day> {
        let shifted = if days >= 0 {
            self.0.checked_add_days(Days::new(days as u64))
        } else {
            self.0.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        shifted.map(Day)
    }

    /// Inclusive number of days from `self` through `end`: the same day counts 1.
    /// Zero or negative when `end` is before `self`.
    pub fn day_count(self, end: Day) -> i64 {
        end.0.signed_duration_since(self.0).num_days() + 1
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for Day {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Day::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    /// Not shaped like `YYYY-MM-DD`.
    Malformed(String),
    /// Shaped right but names no real day (`2023-02-29`).
    NoSuchDay(String),
}

impl fmt::Display for DateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateError::Malformed(s) => write!(f, "malformed date {s:?}, expected YYYY-MM-DD"),
            DateError::NoSuchDay(s) => write!(f, "no such calendar day: {s}"),
        }
    }
}

impl std::error::Error for DateError {}
