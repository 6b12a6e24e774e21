//! Recurrence kinds and the recurring-rule shape shared by bills and income
//!
//! Step arithmetic is always computed from the rule's anchor date rather
//! than from the previous occurrence, so a rule anchored on the 31st lands
//! on the 31st again after passing through a short month.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;
use crate::error::{EngineError, EngineResult};

/// Closed set of recurrence kinds shared by bills, income and envelope periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    OneTime,
    Daily,
    Weekly,
    #[serde(rename = "biweekly")]
    BiWeekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl RecurrenceKind {
    pub const ALL: [RecurrenceKind; 7] = [
        Self::OneTime,
        Self::Daily,
        Self::Weekly,
        Self::BiWeekly,
        Self::Monthly,
        Self::Quarterly,
        Self::Yearly,
    ];

    /// Parse a recurrence kind, failing with a configuration error
    pub fn parse(s: &str) -> EngineResult<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "one_time" | "once" | "onetime" => Ok(Self::OneTime),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "biweekly" | "bi_weekly" => Ok(Self::BiWeekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" | "annual" | "annually" => Ok(Self::Yearly),
            other => Err(EngineError::Config(format!(
                "Invalid recurrence kind: '{}'",
                other
            ))),
        }
    }

    /// Whether the kind repeats (anything but one-time)
    pub fn is_periodic(self) -> bool {
        !matches!(self, Self::OneTime)
    }

    /// The `n`th scheduled date counted from `anchor` (`n` may be negative)
    ///
    /// Returns `None` for a one-time rule at any `n != 0`, or when the result
    /// falls outside chrono's representable range.
    pub fn nth_date(self, anchor: NaiveDate, n: i64) -> Option<NaiveDate> {
        match self {
            Self::OneTime => (n == 0).then_some(anchor),
            Self::Daily => anchor.checked_add_signed(Duration::try_days(n)?),
            Self::Weekly => anchor.checked_add_signed(Duration::try_days(n.checked_mul(7)?)?),
            Self::BiWeekly => anchor.checked_add_signed(Duration::try_days(n.checked_mul(14)?)?),
            Self::Monthly => shift_months(anchor, n),
            Self::Quarterly => shift_months(anchor, n.checked_mul(3)?),
            Self::Yearly => shift_months(anchor, n.checked_mul(12)?),
        }
    }

    /// Largest `n` such that `nth_date(anchor, n) <= date`
    ///
    /// For a one-time rule this is `Some(0)` when `anchor <= date`, else `None`.
    pub fn index_at_or_before(self, anchor: NaiveDate, date: NaiveDate) -> Option<i64> {
        let days = (date - anchor).num_days();
        let months = month_index(date) - month_index(anchor);
        let mut n = match self {
            Self::OneTime => return (anchor <= date).then_some(0),
            Self::Daily => days,
            Self::Weekly => days.div_euclid(7),
            Self::BiWeekly => days.div_euclid(14),
            Self::Monthly => months,
            Self::Quarterly => months.div_euclid(3),
            Self::Yearly => months.div_euclid(12),
        };

        // the estimate is off by at most one step for month-based kinds
        while self.nth_date(anchor, n)? > date {
            n -= 1;
        }
        while matches!(self.nth_date(anchor, n + 1), Some(next) if next <= date) {
            n += 1;
        }
        Some(n)
    }
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneTime => write!(f, "One-time"),
            Self::Daily => write!(f, "Daily"),
            Self::Weekly => write!(f, "Weekly"),
            Self::BiWeekly => write!(f, "Bi-weekly"),
            Self::Monthly => write!(f, "Monthly"),
            Self::Quarterly => write!(f, "Quarterly"),
            Self::Yearly => write!(f, "Yearly"),
        }
    }
}

fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

/// Number of days in the given month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Shift by whole months, clamping the day to the target month's length
pub fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let total = month_index(date).checked_add(months)?;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Amount and schedule shared by bills and income
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringRule {
    /// Base amount of each occurrence
    pub amount: Money,

    pub kind: RecurrenceKind,

    pub start_date: NaiveDate,

    /// Last date an occurrence may fall on (bills only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    pub active: bool,
}

impl RecurringRule {
    pub fn new(amount: Money, kind: RecurrenceKind, start_date: NaiveDate) -> Self {
        Self {
            amount,
            kind,
            start_date,
            end_date: None,
            active: true,
        }
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.amount.is_negative() {
            return Err(RuleValidationError::NegativeAmount(self.amount));
        }

        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(RuleValidationError::EndBeforeStart {
                    start: self.start_date,
                    end,
                });
            }
        }

        Ok(())
    }
}

/// Validation errors for recurring rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleValidationError {
    NegativeAmount(Money),
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for RuleValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeAmount(amount) => {
                write!(f, "Recurring amount cannot be negative: {}", amount)
            }
            Self::EndBeforeStart { start, end } => {
                write!(f, "End date {} is before start date {}", end, start)
            }
        }
    }
}

impl std::error::Error for RuleValidationError {}

impl From<RuleValidationError> for EngineError {
    fn from(err: RuleValidationError) -> Self {
        match err {
            RuleValidationError::EndBeforeStart { .. } => EngineError::Config(err.to_string()),
            RuleValidationError::NegativeAmount(_) => EngineError::Validation(err.to_string()),
        }
    }
}
