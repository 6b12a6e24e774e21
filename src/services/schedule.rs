//! Bill and income scheduling
//!
//! Joins expanded occurrences against what has actually been recorded
//! (bill payments, income receipts) and classifies each occurrence relative
//! to "today". The agenda merges every active bill and income into one
//! date-ordered list.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::expander::{occurrences_in_range, Occurrence};
use crate::error::EngineResult;
use crate::models::{Bill, BillId, Income, IncomeId, Money, Period, TransactionId};
use crate::storage::{Dataset, Storage};

/// Where an occurrence stands relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    /// Not yet recorded, due today or later
    Pending,
    /// Recorded (a bill payment, or an income receipt)
    Paid,
    /// Not recorded and already in the past
    Overdue,
}

impl OccurrenceStatus {
    pub fn classify(date: NaiveDate, settled: bool, today: NaiveDate) -> Self {
        if settled {
            Self::Paid
        } else if date < today {
            Self::Overdue
        } else {
            Self::Pending
        }
    }

    pub fn is_settled(self) -> bool {
        self == Self::Paid
    }
}

impl fmt::Display for OccurrenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Overdue => write!(f, "overdue"),
        }
    }
}

/// An occurrence with its recorded state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledOccurrence {
    pub date: NaiveDate,
    /// Override-resolved scheduled amount
    pub amount: Money,
    pub overridden: bool,
    pub status: OccurrenceStatus,
    /// Amount actually recorded, when settled
    pub recorded_amount: Option<Money>,
    /// Ledger entry that settled the occurrence
    pub transaction_id: Option<TransactionId>,
}

impl ScheduledOccurrence {
    fn new(
        occurrence: Occurrence,
        recorded: Option<(Money, Option<TransactionId>)>,
        today: NaiveDate,
    ) -> Self {
        Self {
            date: occurrence.date,
            amount: occurrence.amount,
            overridden: occurrence.overridden,
            status: OccurrenceStatus::classify(occurrence.date, recorded.is_some(), today),
            recorded_amount: recorded.map(|(amount, _)| amount),
            transaction_id: recorded.and_then(|(_, id)| id),
        }
    }
}

/// Bill occurrences in a window joined against payments by exact date
pub fn bill_occurrences(
    data: &Dataset,
    bill: &Bill,
    window: Period,
    today: NaiveDate,
) -> EngineResult<Vec<ScheduledOccurrence>> {
    let overrides = data.bill_overrides_for(bill.id);
    let occurrences = occurrences_in_range(&bill.rule, &overrides, window.start, window.end)?;
    Ok(occurrences
        .into_iter()
        .map(|o| {
            let recorded = data
                .bill_payment_on(bill.id, o.date)
                .map(|p| (p.amount, p.transaction_id));
            ScheduledOccurrence::new(o, recorded, today)
        })
        .collect())
}

/// Income occurrences in a window joined against receipts by exact date
pub fn income_occurrences(
    data: &Dataset,
    income: &Income,
    window: Period,
    today: NaiveDate,
) -> EngineResult<Vec<ScheduledOccurrence>> {
    let overrides = data.income_overrides_for(income.id);
    let occurrences = occurrences_in_range(&income.rule, &overrides, window.start, window.end)?;
    Ok(occurrences
        .into_iter()
        .map(|o| {
            let recorded = data
                .income_receipt_on(income.id, o.date)
                .map(|t| (t.amount, Some(t.id)));
            ScheduledOccurrence::new(o, recorded, today)
        })
        .collect())
}

/// What an agenda line was expanded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ScheduleSource {
    Bill(BillId),
    Income(IncomeId),
}

impl ScheduleSource {
    pub fn is_income(&self) -> bool {
        matches!(self, Self::Income(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgendaItem {
    pub source: ScheduleSource,
    pub name: String,
    pub occurrence: ScheduledOccurrence,
}

/// Merged, date-ordered schedule for a dataset snapshot
pub fn agenda_for(data: &Dataset, window: Period, today: NaiveDate) -> EngineResult<Vec<AgendaItem>> {
    let mut items = Vec::new();

    for bill in data.bills.iter().filter(|b| b.rule.active) {
        for occurrence in bill_occurrences(data, bill, window, today)? {
            items.push(AgendaItem {
                source: ScheduleSource::Bill(bill.id),
                name: bill.name.clone(),
                occurrence,
            });
        }
    }
    for income in data.incomes.iter().filter(|i| i.rule.active) {
        for occurrence in income_occurrences(data, income, window, today)? {
            items.push(AgendaItem {
                source: ScheduleSource::Income(income.id),
                name: income.name.clone(),
                occurrence,
            });
        }
    }

    // income first on a shared day
    items.sort_by(|a, b| {
        a.occurrence
            .date
            .cmp(&b.occurrence.date)
            .then(b.source.is_income().cmp(&a.source.is_income()))
            .then(a.name.cmp(&b.name))
    });
    Ok(items)
}

/// Read-side service over the combined schedule
pub struct ScheduleService<'a> {
    storage: &'a Storage,
}

impl<'a> ScheduleService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn agenda(&self, window: Period, today: NaiveDate) -> EngineResult<Vec<AgendaItem>> {
        self.storage.read(|data| agenda_for(data, window, today))?
    }

    /// Agenda lines that are neither paid nor received
    pub fn outstanding(&self, window: Period, today: NaiveDate) -> EngineResult<Vec<AgendaItem>> {
        Ok(self
            .agenda(window, today)?
            .into_iter()
            .filter(|item| !item.occurrence.status.is_settled())
            .collect())
    }
}
