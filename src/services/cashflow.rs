//! Cash-flow projection
//!
//! Walks a window day by day starting from the ledger balance the evening
//! before it. Each day applies recorded entries plus every income occurrence
//! not yet received and every bill occurrence not yet paid, then flags the
//! running balance when it goes negative or dips under the warning line.

use chrono::NaiveDate;
use serde::Serialize;

use super::schedule::{bill_occurrences, income_occurrences};
use crate::error::{EngineError, EngineResult};
use crate::models::{AccountId, Money, Period};
use crate::storage::{Dataset, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowEventKind {
    /// Income occurrence not yet received
    ExpectedIncome,
    /// Bill occurrence not yet paid
    UpcomingBill,
    /// Entry already on the ledger
    Recorded,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashFlowEvent {
    pub kind: CashFlowEventKind,
    pub name: String,
    /// Signed effect on the projected balance
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashFlowDay {
    pub date: NaiveDate,
    pub events: Vec<CashFlowEvent>,
    /// Projected balance at the end of the day
    pub balance: Money,
    pub is_negative: bool,
    /// Non-negative but under the warning threshold
    pub is_warning: bool,
}

impl CashFlowDay {
    pub fn net_change(&self) -> Money {
        self.events.iter().map(|e| e.amount).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CashFlowProjection {
    pub window: Period,
    pub opening_balance: Money,
    pub days: Vec<CashFlowDay>,
}

impl CashFlowProjection {
    pub fn closing_balance(&self) -> Money {
        self.days.last().map_or(self.opening_balance, |d| d.balance)
    }

    /// The day with the smallest projected balance (earliest on ties)
    pub fn lowest(&self) -> Option<&CashFlowDay> {
        self.days.iter().min_by_key(|d| (d.balance, d.date))
    }

    pub fn negative_days(&self) -> impl Iterator<Item = &CashFlowDay> {
        self.days.iter().filter(|d| d.is_negative)
    }
}

/// Build a projection from a dataset snapshot
///
/// With `account` set, only that account's balance and the bills and income
/// routed to it are considered.
pub fn project(
    data: &Dataset,
    window: Period,
    today: NaiveDate,
    account: Option<AccountId>,
    warning_threshold: Money,
) -> EngineResult<CashFlowProjection> {
    let in_scope = |id: Option<AccountId>| account.map_or(true, |a| id == Some(a));

    let accounts: Vec<AccountId> = match account {
        Some(id) => {
            data.accounts.require(id)?;
            vec![id]
        }
        None => data.accounts.iter().map(|a| a.id).collect(),
    };
    let eve = window
        .start
        .pred_opt()
        .ok_or_else(|| EngineError::Config(format!("Window {} starts too early", window)))?;
    let mut opening_balance = Money::zero();
    for id in &accounts {
        opening_balance = opening_balance
            .checked_add(data.ledger_balance(*id, Some(eve))?)
            .ok_or_else(|| EngineError::overflow("opening balance"))?;
    }

    let mut events: Vec<(NaiveDate, CashFlowEvent)> = Vec::new();

    for entry in data.transactions_in(window) {
        let amount = Money::try_sum(accounts.iter().map(|a| entry.effect_on(*a)))
            .ok_or_else(|| EngineError::overflow(format!("entry {}", entry.id)))?;
        if amount.is_zero() {
            continue;
        }
        let name = if entry.description.is_empty() {
            entry.kind.to_string()
        } else {
            entry.description.clone()
        };
        events.push((
            entry.date,
            CashFlowEvent {
                kind: CashFlowEventKind::Recorded,
                name,
                amount,
            },
        ));
    }

    for income in data.incomes.iter().filter(|i| i.rule.active && in_scope(i.account_id)) {
        for occurrence in income_occurrences(data, income, window, today)? {
            if occurrence.status.is_settled() {
                continue;
            }
            events.push((
                occurrence.date,
                CashFlowEvent {
                    kind: CashFlowEventKind::ExpectedIncome,
                    name: income.name.clone(),
                    amount: occurrence.amount,
                },
            ));
        }
    }

    for bill in data.bills.iter().filter(|b| b.rule.active && in_scope(b.account_id)) {
        for occurrence in bill_occurrences(data, bill, window, today)? {
            if occurrence.status.is_settled() {
                continue;
            }
            events.push((
                occurrence.date,
                CashFlowEvent {
                    kind: CashFlowEventKind::UpcomingBill,
                    name: bill.name.clone(),
                    amount: -occurrence.amount,
                },
            ));
        }
    }

    events.sort_by(|a, b| a.0.cmp(&b.0));

    let mut pending = events.into_iter().peekable();
    let mut balance = opening_balance;
    let mut days = Vec::with_capacity(usize::try_from(window.num_days()).unwrap_or(0));
    for date in window.days() {
        let mut today_events = Vec::new();
        while let Some((_, event)) = pending.next_if(|(d, _)| *d == date) {
            balance = balance
                .checked_add(event.amount)
                .ok_or_else(|| EngineError::overflow(format!("projected balance on {}", date)))?;
            today_events.push(event);
        }
        days.push(CashFlowDay {
            date,
            events: today_events,
            balance,
            is_negative: balance.is_negative(),
            is_warning: !balance.is_negative() && balance < warning_threshold,
        });
    }

    Ok(CashFlowProjection {
        window,
        opening_balance,
        days,
    })
}

/// Service wrapper running projections against committed state
pub struct CashFlowService<'a> {
    storage: &'a Storage,
    warning_threshold: Money,
}

impl<'a> CashFlowService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            warning_threshold: Money::from_units(100),
        }
    }

    pub fn with_warning_threshold(mut self, threshold: Money) -> Self {
        self.warning_threshold = threshold;
        self
    }

    pub fn project(&self, window: Period, today: NaiveDate, account: Option<AccountId>) -> EngineResult<CashFlowProjection> {
        let threshold = self.warning_threshold;
        self.storage
            .read(|data| project(data, window, today, account, threshold))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountKind, RecurrenceKind, RecurringRule, Transaction};
    use crate::services::{BillService, IncomeService, LedgerService, PaymentOptions};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup(starting: i64) -> (Storage, AccountId) {
        let storage = Storage::in_memory();
        let account = Account::new("Checking", AccountKind::Checking, Money::from_units(starting));
        let id = account.id;
        storage.write(|txn| txn.insert(account)).unwrap();
        (storage, id)
    }

    #[test]
    fn test_projection_applies_unsettled_occurrences() {
        let (storage, account) = setup(150);
        let rent = BillService::new(&storage)
            .create(
                "Rent",
                RecurringRule::new(Money::from_units(100), RecurrenceKind::Monthly, date(2024, 1, 3)),
                Some(account),
            )
            .unwrap();
        IncomeService::new(&storage)
            .create(
                "Salary",
                RecurringRule::new(Money::from_units(1000), RecurrenceKind::Monthly, date(2024, 1, 5)),
                account,
            )
            .unwrap();

        let window = Period::new(date(2024, 1, 1), date(2024, 1, 6)).unwrap();
        let projection = CashFlowService::new(&storage)
            .project(window, date(2024, 1, 1), None)
            .unwrap();

        assert_eq!(projection.opening_balance, Money::from_units(150));
        let balances: Vec<Money> = projection.days.iter().map(|d| d.balance).collect();
        assert_eq!(
            balances,
            vec![
                Money::from_units(150),
                Money::from_units(150),
                Money::from_units(50),
                Money::from_units(50),
                Money::from_units(1050),
                Money::from_units(1050)
            ]
        );
        assert!(projection.days[2].is_warning);
        assert!(!projection.days[4].is_warning);

        // once paid, the bill shows as a recorded entry instead
        BillService::new(&storage)
            .record_payment(rent.id, date(2024, 1, 3), PaymentOptions::default())
            .unwrap();
        let after = CashFlowService::new(&storage)
            .project(window, date(2024, 1, 1), None)
            .unwrap();
        assert_eq!(after.days[2].balance, Money::from_units(50));
        assert_eq!(after.days[2].events.len(), 1);
        assert_eq!(after.days[2].events[0].kind, CashFlowEventKind::Recorded);
    }

    #[test]
    fn test_negative_days_flagged() {
        let (storage, account) = setup(20);
        LedgerService::new(&storage)
            .record(Transaction::expense(account, Money::from_units(50), date(2024, 1, 2)))
            .unwrap();

        let window = Period::new(date(2024, 1, 1), date(2024, 1, 3)).unwrap();
        let projection = CashFlowService::new(&storage)
            .project(window, date(2024, 1, 1), Some(account))
            .unwrap();

        assert!(!projection.days[0].is_negative);
        assert!(projection.days[0].is_warning);
        assert!(projection.days[1].is_negative);
        assert!(!projection.days[1].is_warning);
        assert_eq!(projection.negative_days().count(), 2);
        assert_eq!(projection.lowest().unwrap().date, date(2024, 1, 2));
        assert_eq!(projection.closing_balance(), Money::from_units(-30));
    }

    #[test]
    fn test_internal_transfer_is_neutral_for_all_accounts() {
        let (storage, checking) = setup(500);
        let savings = Account::new("Savings", AccountKind::Savings, Money::zero());
        let savings_id = savings.id;
        storage.write(|txn| txn.insert(savings)).unwrap();
        LedgerService::new(&storage)
            .record(Transaction::transfer(checking, savings_id, Money::from_units(200), date(2024, 1, 2)))
            .unwrap();

        let window = Period::new(date(2024, 1, 1), date(2024, 1, 3)).unwrap();
        let all = CashFlowService::new(&storage)
            .project(window, date(2024, 1, 1), None)
            .unwrap();
        assert!(all.days.iter().all(|d| d.balance == Money::from_units(500)));

        let only_checking = CashFlowService::new(&storage)
            .project(window, date(2024, 1, 1), Some(checking))
            .unwrap();
        assert_eq!(only_checking.closing_balance(), Money::from_units(300));
    }
}
