//! Inclusive calendar date ranges
//!
//! Used both for query windows and for the concrete periods an envelope is
//! budgeted over.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, EngineResult};

/// An inclusive `[start, end]` range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Create a period, rejecting `end < start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> EngineResult<Self> {
        if end < start {
            return Err(EngineError::Config(format!(
                "Invalid date range: {} is after {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// A single-day period
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, inclusive
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Iterate every date in the period
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.num_days()).map(move |offset| start + Duration::days(offset))
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rejects_inverted_range() {
        let err = Period::new(date(2024, 2, 1), date(2024, 1, 31)).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let p = Period::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        assert!(p.contains(date(2024, 1, 1)));
        assert!(p.contains(date(2024, 1, 31)));
        assert!(!p.contains(date(2024, 2, 1)));
        assert_eq!(p.num_days(), 31);
    }

    #[test]
    fn test_days_iterates_every_date() {
        let p = Period::new(date(2024, 2, 27), date(2024, 3, 1)).unwrap();
        let days: Vec<_> = p.days().collect();
        assert_eq!(
            days,
            vec![
                date(2024, 2, 27),
                date(2024, 2, 28),
                date(2024, 2, 29),
                date(2024, 3, 1)
            ]
        );
    }

    #[test]
    fn test_overlaps() {
        let a = Period::new(date(2024, 1, 1), date(2024, 1, 15)).unwrap();
        let b = Period::new(date(2024, 1, 15), date(2024, 1, 31)).unwrap();
        let c = Period::day(date(2024, 2, 1));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
