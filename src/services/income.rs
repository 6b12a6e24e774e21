//! Income service
//!
//! Income sources, their per-date overrides and receipt recording. A receipt
//! is an income entry on the ledger carrying the income link and the
//! occurrence date.

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use super::expander::is_scheduled_on;
use super::ledger::post_entry;
use super::schedule::{income_occurrences, ScheduledOccurrence};
use crate::config::DuplicatePaymentPolicy;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AccountId, EntityRef, Income, IncomeId, IncomeOverride, Money, Period, RecurringRule,
    Transaction,
};
use crate::storage::{DeleteOutcome, Storage};

/// Service for income management
pub struct IncomeService<'a> {
    storage: &'a Storage,
    duplicate_policy: DuplicatePaymentPolicy,
}

impl<'a> IncomeService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            duplicate_policy: DuplicatePaymentPolicy::default(),
        }
    }

    /// Use a specific policy for re-recording a received date
    pub fn with_duplicate_policy(mut self, policy: DuplicatePaymentPolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Create a new income source paid into `account`
    pub fn create(&self, name: &str, rule: RecurringRule, account: AccountId) -> EngineResult<Income> {
        let income = Income::new(name.trim(), rule, account);
        income.validate()?;

        let created = income.clone();
        self.storage.write(|txn| {
            txn.ensure_reference(EntityRef::Account(account))?;
            txn.insert(income)
        })?;
        info!(income = %created.id, name = %created.name, "income created");
        Ok(created)
    }

    pub fn get(&self, id: IncomeId) -> EngineResult<Income> {
        self.storage.read(|data| data.incomes.require(id).cloned())?
    }

    /// Find an income by name (case-insensitive) or ID string
    pub fn find(&self, identifier: &str) -> EngineResult<Option<Income>> {
        self.storage.read(|data| {
            data.incomes
                .iter()
                .find(|i| i.name.eq_ignore_ascii_case(identifier))
                .or_else(|| {
                    identifier
                        .parse::<IncomeId>()
                        .ok()
                        .and_then(|id| data.incomes.get(id))
                })
                .cloned()
        })
    }

    pub fn list(&self, include_inactive: bool) -> EngineResult<Vec<Income>> {
        self.storage.read(|data| {
            let mut incomes: Vec<Income> = data
                .incomes
                .iter()
                .filter(|i| include_inactive || i.rule.active)
                .cloned()
                .collect();
            incomes.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            incomes
        })
    }

    pub fn update(&self, mut income: Income) -> EngineResult<Income> {
        income.validate()?;
        income.updated_at = Utc::now();
        let updated = income.clone();
        self.storage.write(|txn| {
            if let Some(account) = income.account_id {
                txn.ensure_reference(EntityRef::Account(account))?;
            }
            txn.update(income)
        })?;
        Ok(updated)
    }

    pub fn set_active(&self, id: IncomeId, active: bool) -> EngineResult<Income> {
        self.storage.write(|txn| {
            txn.modify::<Income>(id, |i| {
                i.rule.active = active;
                i.updated_at = Utc::now();
            })
        })
    }

    /// Delete an income with its overrides
    ///
    /// Receipts stay on the ledger and allocations it funded stay, both with
    /// the income link cleared.
    pub fn delete(&self, id: IncomeId) -> EngineResult<DeleteOutcome> {
        self.storage.write(|txn| txn.delete(EntityRef::Income(id)))
    }

    pub fn add_override(&self, income_id: IncomeId, date: NaiveDate, amount: Money) -> EngineResult<IncomeOverride> {
        if amount.is_negative() {
            return Err(EngineError::Validation(format!(
                "Override amount cannot be negative: {}",
                amount
            )));
        }
        self.storage.write(|txn| {
            txn.ensure_reference(EntityRef::Income(income_id))?;
            if txn.income_override_on(income_id, date).is_some() {
                return Err(EngineError::duplicate(
                    "IncomeOverride",
                    format!("{} on {}", income_id, date),
                ));
            }
            let row = IncomeOverride::new(income_id, date, amount);
            txn.insert(row.clone())?;
            Ok(row)
        })
    }

    pub fn remove_override(&self, income_id: IncomeId, date: NaiveDate) -> EngineResult<()> {
        self.storage.write(|txn| {
            let id = txn
                .income_override_on(income_id, date)
                .map(|o| o.id)
                .ok_or_else(|| {
                    EngineError::not_found("IncomeOverride", format!("{} on {}", income_id, date))
                })?;
            txn.delete(EntityRef::IncomeOverride(id))?;
            Ok(())
        })
    }

    /// Occurrences in a window with their received/pending/overdue status
    pub fn occurrences(&self, income_id: IncomeId, window: Period, today: NaiveDate) -> EngineResult<Vec<ScheduledOccurrence>> {
        self.storage.read(|data| {
            let income = data.incomes.require(income_id)?;
            income_occurrences(data, income, window, today)
        })?
    }

    /// Confirm one occurrence as received
    ///
    /// The amount defaults to the override-resolved occurrence amount and the
    /// account to the income's own account.
    pub fn record_income(
        &self,
        income_id: IncomeId,
        date: NaiveDate,
        account: Option<AccountId>,
        amount: Option<Money>,
    ) -> EngineResult<Transaction> {
        let policy = self.duplicate_policy;
        let entry = self.storage.write(|txn| {
            let income = txn.incomes.require(income_id)?.clone();
            if !income.rule.active {
                return Err(EngineError::Validation(format!(
                    "Income '{}' is paused; resume it before recording a receipt",
                    income.name
                )));
            }
            if !is_scheduled_on(&income.rule, date) {
                return Err(EngineError::Config(format!(
                    "{} is not a scheduled date for income '{}'",
                    date, income.name
                )));
            }

            let account = account.or(income.account_id).ok_or_else(|| {
                EngineError::Validation(format!("Income '{}' has no receiving account", income.name))
            })?;
            let amount = amount.unwrap_or_else(|| {
                txn.income_override_on(income.id, date)
                    .map_or(income.rule.amount, |o| o.amount)
            });
            if !amount.is_positive() {
                return Err(EngineError::Validation(format!(
                    "Received amount must be positive: {}",
                    amount
                )));
            }

            if let Some(existing) = txn.income_receipt_on(income.id, date).map(|t| t.id) {
                match policy {
                    DuplicatePaymentPolicy::Reject => {
                        return Err(EngineError::duplicate(
                            "IncomeReceipt",
                            format!("{} on {}", income.name, date),
                        ));
                    }
                    DuplicatePaymentPolicy::Replace => {
                        debug!(entry = %existing, "replacing earlier receipt");
                        txn.delete(EntityRef::Transaction(existing))?;
                    }
                }
            }

            let mut entry = Transaction::income(account, amount, date)
                .with_description(format!("Income received: {}", income.name));
            entry.income_id = Some(income.id);
            post_entry(txn, entry.clone())?;
            Ok(entry)
        })?;

        info!(income = %income_id, date = %date, amount = %entry.amount, "income received");
        Ok(entry)
    }

    /// Remove the receipt recorded for one occurrence
    pub fn undo_receipt(&self, income_id: IncomeId, date: NaiveDate) -> EngineResult<Transaction> {
        self.storage.write(|txn| {
            let entry = txn
                .income_receipt_on(income_id, date)
                .cloned()
                .ok_or_else(|| EngineError::not_found("IncomeReceipt", format!("{} on {}", income_id, date)))?;
            txn.delete(EntityRef::Transaction(entry.id))?;
            Ok(entry)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountKind, RecurrenceKind};
    use crate::services::LedgerService;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Storage, AccountId, Income) {
        let storage = Storage::in_memory();
        let account = Account::new("Checking", AccountKind::Checking, Money::zero());
        let account_id = account.id;
        storage.write(|txn| txn.insert(account)).unwrap();

        let income = IncomeService::new(&storage)
            .create(
                "Salary",
                RecurringRule::new(Money::from_units(2000), RecurrenceKind::BiWeekly, date(2024, 1, 5)),
                account_id,
            )
            .unwrap();
        (storage, account_id, income)
    }

    #[test]
    fn test_record_income_links_entry() {
        let (storage, account, income) = setup();
        let service = IncomeService::new(&storage);

        let entry = service.record_income(income.id, date(2024, 1, 19), None, None).unwrap();
        assert_eq!(entry.income_id, Some(income.id));
        assert_eq!(entry.amount, Money::from_units(2000));
        assert_eq!(
            LedgerService::new(&storage).current_balance(account).unwrap(),
            Money::from_units(2000)
        );

        let window = Period::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        let statuses: Vec<_> = service
            .occurrences(income.id, window, date(2024, 1, 20))
            .unwrap()
            .into_iter()
            .map(|o| o.status.to_string())
            .collect();
        assert_eq!(statuses, vec!["overdue", "paid"]);
    }

    #[test]
    fn test_override_amount_used_for_receipt() {
        let (storage, _, income) = setup();
        let service = IncomeService::new(&storage);
        service
            .add_override(income.id, date(2024, 2, 2), Money::from_units(2500))
            .unwrap();
        let entry = service.record_income(income.id, date(2024, 2, 2), None, None).unwrap();
        assert_eq!(entry.amount, Money::from_units(2500));
    }

    #[test]
    fn test_duplicate_receipt_policy() {
        let (storage, account, income) = setup();
        IncomeService::new(&storage)
            .record_income(income.id, date(2024, 1, 5), None, None)
            .unwrap();

        let err = IncomeService::new(&storage)
            .record_income(income.id, date(2024, 1, 5), None, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::Duplicate { .. }));

        IncomeService::new(&storage)
            .with_duplicate_policy(DuplicatePaymentPolicy::Replace)
            .record_income(income.id, date(2024, 1, 5), None, Some(Money::from_units(1800)))
            .unwrap();
        assert_eq!(
            LedgerService::new(&storage).current_balance(account).unwrap(),
            Money::from_units(1800)
        );
    }

    #[test]
    fn test_paused_income_rejects_receipt() {
        let (storage, _, income) = setup();
        let service = IncomeService::new(&storage);
        service.set_active(income.id, false).unwrap();

        let err = service
            .record_income(income.id, date(2024, 1, 5), None, None)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(storage.read(|d| d.transactions.len()).unwrap(), 0);
    }

    #[test]
    fn test_end_date_is_configuration_error() {
        let (storage, account, _) = setup();
        let rule = RecurringRule::new(Money::from_units(10), RecurrenceKind::Weekly, date(2024, 1, 1))
            .with_end_date(date(2024, 6, 1));
        let err = IncomeService::new(&storage).create("Gig", rule, account).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_delete_keeps_receipts_unlinked() {
        let (storage, account, income) = setup();
        let service = IncomeService::new(&storage);
        let entry = service.record_income(income.id, date(2024, 1, 5), None, None).unwrap();

        service.delete(income.id).unwrap();
        let kept = LedgerService::new(&storage).get(entry.id).unwrap();
        assert!(kept.income_id.is_none());
        assert_eq!(
            LedgerService::new(&storage).current_balance(account).unwrap(),
            Money::from_units(2000)
        );
    }

    #[test]
    fn test_undo_receipt() {
        let (storage, account, income) = setup();
        let service = IncomeService::new(&storage);
        service.record_income(income.id, date(2024, 1, 5), None, None).unwrap();
        service.undo_receipt(income.id, date(2024, 1, 5)).unwrap();
        assert_eq!(
            LedgerService::new(&storage).current_balance(account).unwrap(),
            Money::zero()
        );
        assert!(service.undo_receipt(income.id, date(2024, 1, 5)).unwrap_err().is_not_found());
    }
}
