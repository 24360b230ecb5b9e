//! Calendar day of a channel log shard.
//!
//! The log service decides what "today" is: a HEAD on the channel's raw log
//! redirects to `/channel/<channel>/<year>/<month>/<day>`, and that path is
//! the only source of a [`DayKey`]. The local clock is never consulted.

use chrono::{Datelike, NaiveDate};
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Parse the path of the redirect target of `/channel/<c>?raw`.
    ///
    /// The path must split on `/` into at least six segments
    /// (`"", "channel", <c>, <y>, <m>, <d>`).
    pub fn from_log_path(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 6 {
            return Err(Error::Format(path.to_string()));
        }
        parse_ymd(segments[3], segments[4], segments[5])
            .ok_or_else(|| Error::Format(path.to_string()))
    }

    /// Parse the date part of a store key. Unpadded components are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('-');
        let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        parse_ymd(y, m, d)
    }

    /// Whole calendar days from `self` to `current` (positive when `self` is older).
    pub fn days_before(&self, current: &DayKey) -> i64 {
        current.0.signed_duration_since(self.0).num_days()
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// `Y-M-D` without zero padding, the way the redirect path spells it.
    pub fn unpadded(&self) -> String {
        format!("{}-{}-{}", self.0.year(), self.0.month(), self.0.day())
    }
}

fn parse_ymd(y: &str, m: &str, d: &str) -> Option<DayKey> {
    let year = y.trim().parse::<i32>().ok()?;
    let month = m.trim().parse::<u32>().ok()?;
    let day = d.trim().parse::<u32>().ok()?;
    DayKey::from_ymd(year, month, day)
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_log_path() {
        let key = DayKey::from_log_path("/channel/quin69/2024/3/5").unwrap();
        assert_eq!(key, DayKey::from_ymd(2024, 3, 5).unwrap());
        assert_eq!(key.to_string(), "2024-03-05");
    }

    #[test]
    fn test_from_log_path_trailing_segments_ignored() {
        let key = DayKey::from_log_path("/channel/quin69/2024/12/31/").unwrap();
        assert_eq!(key.to_string(), "2024-12-31");
    }

    #[test]
    fn test_from_log_path_too_short() {
        let err = DayKey::from_log_path("/channel/quin69").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_from_log_path_not_a_date() {
        assert!(DayKey::from_log_path("/channel/quin69/user/sheepfarmer").is_err());
        assert!(DayKey::from_log_path("/channel/quin69/2024/13/01").is_err());
    }

    #[test]
    fn test_parse_key_forms() {
        let a = DayKey::parse("2024-3-5").unwrap();
        let b = DayKey::parse("2024-03-05").unwrap();
        assert_eq!(a, b);
        assert!(DayKey::parse("2024-03").is_none());
        assert!(DayKey::parse("2024-03-05-1").is_none());
        assert!(DayKey::parse("yesterday").is_none());
    }

    #[test]
    fn test_unpadded() {
        let key = DayKey::from_log_path("/channel/quin69/2024/6/1").unwrap();
        assert_eq!(key.unpadded(), "2024-6-1");
        assert_eq!(DayKey::from_ymd(2024, 11, 30).unwrap().unpadded(), "2024-11-30");
    }

    #[test]
    fn test_days_before_across_month() {
        let current = DayKey::from_ymd(2024, 3, 1).unwrap();
        let old = DayKey::from_ymd(2024, 2, 28).unwrap();
        // 2024 is a leap year
        assert_eq!(old.days_before(&current), 2);
        assert_eq!(current.days_before(&current), 0);
        assert_eq!(current.days_before(&old), -2);
    }
}
