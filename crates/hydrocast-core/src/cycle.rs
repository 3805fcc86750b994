//! Forecast cycle: a timestamp aligned to the fixed hour grid the
//! forecasting engine runs on.

use crate::error::{HydrocastError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use std::fmt;

/// Hour grid shared by every operational run unless overridden in config.
pub const DEFAULT_TIME_INCREMENT: u32 = 6;

/// A forecast reference timestamp truncated to a fixed hour increment.
///
/// The hour always satisfies `hour % increment == 0`. A cycle is never
/// mutated in place: `step_back` returns a new, earlier cycle, which is how
/// the retry scheduler threads its backward search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastCycle {
    datetime: NaiveDateTime,
    increment: u32,
}

impl ForecastCycle {
    /// Truncate `datetime` down to the cycle grid (minutes and seconds are
    /// dropped, the hour is rounded down to a multiple of `increment`).
    pub fn new(datetime: NaiveDateTime, increment: u32) -> Self {
        let increment = if increment == 0 || 24 % increment != 0 {
            DEFAULT_TIME_INCREMENT
        } else {
            increment
        };
        // hour() < 24 and increment divides 24, so the truncated hour stays valid
        let hour = increment * (datetime.hour() / increment);
        let datetime = datetime
            .date()
            .and_hms_opt(hour, 0, 0)
            .expect("truncated hour below 24");
        Self {
            datetime,
            increment,
        }
    }

    /// The current UTC time, truncated to the grid.
    pub fn now(increment: u32) -> Self {
        Self::new(Utc::now().naive_utc(), increment)
    }

    /// Parse a `"YYYY-MM-DD HH"` (or `"YYYY-MM-DDTHH"`) string.
    pub fn parse(input: &str, increment: u32) -> Result<Self> {
        let s = input.trim();
        let (date_part, hour_part) = s
            .split_once([' ', 'T'])
            .ok_or_else(|| HydrocastError::InvalidDate(input.to_string()))?;
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|_| HydrocastError::InvalidDate(input.to_string()))?;
        let hour: u32 = hour_part
            .trim()
            .parse()
            .map_err(|_| HydrocastError::InvalidDate(input.to_string()))?;
        let datetime = date
            .and_hms_opt(hour, 0, 0)
            .ok_or_else(|| HydrocastError::InvalidDate(input.to_string()))?;
        Ok(Self::new(datetime, increment))
    }

    /// A new cycle `hours` earlier. Stepping by a multiple of the increment
    /// keeps the result on the grid.
    pub fn step_back(&self, hours: i64) -> Self {
        Self {
            datetime: self.datetime - Duration::hours(hours),
            increment: self.increment,
        }
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }

    pub fn increment(&self) -> u32 {
        self.increment
    }

    /// Compact stamp used on the engine command line: `YYYYMMDDHH`.
    pub fn stamp(&self) -> String {
        self.datetime.format("%Y%m%d%H").to_string()
    }

    /// Stamp used in artifact file names: `YYYY-MM-DD_HH`.
    pub fn file_stamp(&self) -> String {
        self.datetime.format("%Y-%m-%d_%H").to_string()
    }

    /// Day-only stamp used when matching incoming feed files: `YYYYMMDD`.
    pub fn day_stamp(&self) -> String {
        self.datetime.format("%Y%m%d").to_string()
    }
}

impl fmt::Display for ForecastCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.datetime.format("%Y-%m-%d %H:00"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn truncates_to_grid() {
        let c = ForecastCycle::new(dt(2022, 10, 1, 17, 42), 6);
        assert_eq!(c.datetime(), dt(2022, 10, 1, 12, 0));
        assert_eq!(c.stamp(), "2022100112");
    }

    #[test]
    fn hour_on_grid_is_kept() {
        let c = ForecastCycle::new(dt(2022, 10, 1, 18, 0), 6);
        assert_eq!(c.datetime(), dt(2022, 10, 1, 18, 0));
    }

    #[test]
    fn invalid_increment_falls_back_to_default() {
        let c = ForecastCycle::new(dt(2022, 10, 1, 17, 0), 5);
        assert_eq!(c.increment(), DEFAULT_TIME_INCREMENT);
        assert_eq!(c.datetime(), dt(2022, 10, 1, 12, 0));
    }

    #[test]
    fn parse_space_and_t_separator() {
        let a = ForecastCycle::parse("2022-10-01 06", 6).unwrap();
        let b = ForecastCycle::parse("2022-10-01T06", 6).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.datetime(), dt(2022, 10, 1, 6, 0));
    }

    #[test]
    fn parse_truncates_off_grid_hour() {
        let c = ForecastCycle::parse("2022-10-01 07", 6).unwrap();
        assert_eq!(c.datetime(), dt(2022, 10, 1, 6, 0));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ForecastCycle::parse("yesterday", 6).is_err());
        assert!(ForecastCycle::parse("2022-10-01", 6).is_err());
        assert!(ForecastCycle::parse("2022-10-01 25", 6).is_err());
    }

    #[test]
    fn step_back_crosses_midnight() {
        let c = ForecastCycle::new(dt(2022, 10, 1, 0, 0), 6);
        let earlier = c.step_back(6);
        assert_eq!(earlier.datetime(), dt(2022, 9, 30, 18, 0));
        // the original cycle is untouched
        assert_eq!(c.datetime(), dt(2022, 10, 1, 0, 0));
    }

    #[test]
    fn stamps() {
        let c = ForecastCycle::new(dt(2022, 10, 1, 6, 0), 6);
        assert_eq!(c.stamp(), "2022100106");
        assert_eq!(c.file_stamp(), "2022-10-01_06");
        assert_eq!(c.day_stamp(), "20221001");
        assert_eq!(c.to_string(), "2022-10-01 06:00");
    }
}
