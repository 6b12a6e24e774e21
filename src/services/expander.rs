//! Recurrence expander
//!
//! Pure functions that turn a recurring rule into concrete dated occurrences
//! and carve a timeline into contiguous envelope periods. Nothing here reads
//! storage; callers pass the rule and its override map in.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::models::{Period, RecurrenceKind, RecurringRule};
use crate::storage::OverrideMap;

/// One concrete occurrence of a rule with its resolved amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub amount: crate::models::Money,
    /// The amount came from a date override
    pub overridden: bool,
}

fn resolve(rule: &RecurringRule, overrides: &OverrideMap, date: NaiveDate) -> Occurrence {
    match overrides.get(&date) {
        Some(amount) => Occurrence {
            date,
            amount: *amount,
            overridden: true,
        },
        None => Occurrence {
            date,
            amount: rule.amount,
            overridden: false,
        },
    }
}

/// Index of the first scheduled date on or after `date` (never below zero)
fn first_index_on_or_after(rule: &RecurringRule, date: NaiveDate) -> i64 {
    let kind = rule.kind;
    let n = match kind.index_at_or_before(rule.start_date, date) {
        Some(n) if kind.nth_date(rule.start_date, n) == Some(date) => n,
        Some(n) => n + 1,
        None => 0,
    };
    n.max(0)
}

/// Occurrences of `rule` dated within `[range_start, range_end]`, in order
///
/// Inactive rules and rules starting after the range yield nothing. The rule's
/// end date, when present, caps the sequence. An override keyed by an
/// occurrence's exact date replaces its amount.
pub fn occurrences_in_range(
    rule: &RecurringRule,
    overrides: &OverrideMap,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> EngineResult<Vec<Occurrence>> {
    rule.validate()?;
    let range = Period::new(range_start, range_end)?;

    if !rule.active {
        return Ok(Vec::new());
    }

    let last = rule.end_date.map_or(range.end, |end| end.min(range.end));
    if rule.start_date > last {
        return Ok(Vec::new());
    }

    let mut occurrences = Vec::new();
    let mut n = first_index_on_or_after(rule, range.start);
    while let Some(date) = rule.kind.nth_date(rule.start_date, n) {
        if date > last {
            break;
        }
        occurrences.push(resolve(rule, overrides, date));
        n += 1;
    }
    Ok(occurrences)
}

/// First occurrence on or after `from`, if the rule still has one
pub fn next_occurrence(rule: &RecurringRule, overrides: &OverrideMap, from: NaiveDate) -> Option<Occurrence> {
    if !rule.active {
        return None;
    }
    let date = rule
        .kind
        .nth_date(rule.start_date, first_index_on_or_after(rule, from))?;
    match rule.end_date {
        Some(end) if date > end => None,
        _ => Some(resolve(rule, overrides, date)),
    }
}

/// Whether `date` is one of the rule's scheduled dates
///
/// The `active` flag is not consulted; services that settle occurrences
/// reject paused rules themselves.
pub fn is_scheduled_on(rule: &RecurringRule, date: NaiveDate) -> bool {
    if date < rule.start_date || rule.end_date.is_some_and(|end| date > end) {
        return false;
    }
    rule.kind
        .index_at_or_before(rule.start_date, date)
        .and_then(|n| rule.kind.nth_date(rule.start_date, n))
        == Some(date)
}

/// The period of a `kind` timeline anchored at `anchor` that contains `date`
///
/// Periods start on every scheduled date of the timeline and end the day
/// before the next one, so consecutive periods tile without gaps. Dates
/// before the anchor fall in periods extended backwards.
pub fn period_containing(kind: RecurrenceKind, anchor: NaiveDate, date: NaiveDate) -> EngineResult<Period> {
    if !kind.is_periodic() {
        return Err(EngineError::Config(format!(
            "{} cannot be used as a budgeting period",
            kind
        )));
    }

    let out_of_range = || EngineError::Config(format!("Date {} is out of range for {} periods", date, kind));
    let n = kind.index_at_or_before(anchor, date).ok_or_else(out_of_range)?;
    let start = kind.nth_date(anchor, n).ok_or_else(out_of_range)?;
    let end = kind
        .nth_date(anchor, n + 1)
        .and_then(|next| next.pred_opt())
        .ok_or_else(out_of_range)?;
    Period::new(start, end)
}

/// The period right after `period`
pub fn next_period(kind: RecurrenceKind, anchor: NaiveDate, period: Period) -> EngineResult<Period> {
    let day_after = period
        .end
        .succ_opt()
        .ok_or_else(|| EngineError::Config(format!("No period after {}", period)))?;
    period_containing(kind, anchor, day_after)
}

/// The period right before `period`
pub fn previous_period(kind: RecurrenceKind, anchor: NaiveDate, period: Period) -> EngineResult<Period> {
    let day_before = period
        .start
        .pred_opt()
        .ok_or_else(|| EngineError::Config(format!("No period before {}", period)))?;
    period_containing(kind, anchor, day_before)
}

/// Every period overlapping `range`, in order
pub fn periods_overlapping(kind: RecurrenceKind, anchor: NaiveDate, range: Period) -> EngineResult<Vec<Period>> {
    let mut periods = Vec::new();
    let mut current = period_containing(kind, anchor, range.start)?;
    loop {
        periods.push(current);
        if current.end >= range.end {
            break;
        }
        current = next_period(kind, anchor, current)?;
    }
    Ok(periods)
}
