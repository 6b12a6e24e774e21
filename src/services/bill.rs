//! Bill service
//!
//! Bill CRUD, per-date overrides, the due-occurrence view and payment
//! recording. A payment and its linked expense entry are always written in
//! the same storage transaction.

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::expander::is_scheduled_on;
use super::ledger::post_entry;
use super::schedule::{bill_occurrences, ScheduledOccurrence};
use crate::config::DuplicatePaymentPolicy;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AccountId, Bill, BillId, BillOverride, BillPayment, EntityRef, EnvelopeId, Money, Period,
    RecurringRule, Transaction,
};
use crate::storage::{DeleteOutcome, Storage, WriteTxn};

/// Service for bill management
pub struct BillService<'a> {
    storage: &'a Storage,
    duplicate_policy: DuplicatePaymentPolicy,
}

/// Options for recording a payment
#[derive(Debug, Clone, Default)]
pub struct PaymentOptions {
    /// Paying account; defaults to the bill's account
    pub account: Option<AccountId>,
    /// Amount actually paid; defaults to the override-resolved amount
    pub amount: Option<Money>,
    /// Envelope to charge the expense to
    pub envelope: Option<EnvelopeId>,
}

/// A bill due soon enough to remind about
#[derive(Debug, Clone, Serialize)]
pub struct Reminder {
    pub bill_id: BillId,
    pub name: String,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub days_until: i64,
}

impl<'a> BillService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            duplicate_policy: DuplicatePaymentPolicy::default(),
        }
    }

    /// Use a specific policy for re-paying a paid date
    pub fn with_duplicate_policy(mut self, policy: DuplicatePaymentPolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Create a new bill
    pub fn create(&self, name: &str, rule: RecurringRule, account: Option<AccountId>) -> EngineResult<Bill> {
        let mut bill = Bill::new(name.trim(), rule);
        bill.account_id = account;
        bill.validate()?;

        let created = bill.clone();
        self.storage.write(|txn| {
            if let Some(account) = bill.account_id {
                txn.ensure_reference(EntityRef::Account(account))?;
            }
            txn.insert(bill)
        })?;
        info!(bill = %created.id, name = %created.name, "bill created");
        Ok(created)
    }

    pub fn get(&self, id: BillId) -> EngineResult<Bill> {
        self.storage.read(|data| data.bills.require(id).cloned())?
    }

    /// Find a bill by name (case-insensitive) or ID string
    pub fn find(&self, identifier: &str) -> EngineResult<Option<Bill>> {
        self.storage.read(|data| {
            data.bills
                .iter()
                .find(|b| b.name.eq_ignore_ascii_case(identifier))
                .or_else(|| {
                    identifier
                        .parse::<BillId>()
                        .ok()
                        .and_then(|id| data.bills.get(id))
                })
                .cloned()
        })
    }

    /// All bills ordered by name
    pub fn list(&self, include_inactive: bool) -> EngineResult<Vec<Bill>> {
        self.storage.read(|data| {
            let mut bills: Vec<Bill> = data
                .bills
                .iter()
                .filter(|b| include_inactive || b.rule.active)
                .cloned()
                .collect();
            bills.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            bills
        })
    }

    /// Save changes to an existing bill
    pub fn update(&self, mut bill: Bill) -> EngineResult<Bill> {
        bill.validate()?;
        bill.updated_at = Utc::now();
        let updated = bill.clone();
        self.storage.write(|txn| {
            if let Some(account) = bill.account_id {
                txn.ensure_reference(EntityRef::Account(account))?;
            }
            txn.update(bill)
        })?;
        Ok(updated)
    }

    pub fn set_active(&self, id: BillId, active: bool) -> EngineResult<Bill> {
        self.storage.write(|txn| {
            txn.modify::<Bill>(id, |b| {
                b.rule.active = active;
                b.updated_at = Utc::now();
            })
        })
    }

    /// Delete a bill with its overrides and payments
    ///
    /// Ledger entries that paid the bill stay, with their bill link cleared.
    pub fn delete(&self, id: BillId) -> EngineResult<DeleteOutcome> {
        self.storage.write(|txn| txn.delete(EntityRef::Bill(id)))
    }

    /// Replace the amount of one occurrence
    pub fn add_override(&self, bill_id: BillId, date: NaiveDate, amount: Money) -> EngineResult<BillOverride> {
        if amount.is_negative() {
            return Err(EngineError::Validation(format!(
                "Override amount cannot be negative: {}",
                amount
            )));
        }
        self.storage.write(|txn| {
            txn.ensure_reference(EntityRef::Bill(bill_id))?;
            if txn.bill_override_on(bill_id, date).is_some() {
                return Err(EngineError::duplicate(
                    "BillOverride",
                    format!("{} on {}", bill_id, date),
                ));
            }
            let row = BillOverride::new(bill_id, date, amount);
            txn.insert(row.clone())?;
            Ok(row)
        })
    }

    pub fn remove_override(&self, bill_id: BillId, date: NaiveDate) -> EngineResult<()> {
        self.storage.write(|txn| {
            let id = txn
                .bill_override_on(bill_id, date)
                .map(|o| o.id)
                .ok_or_else(|| EngineError::not_found("BillOverride", format!("{} on {}", bill_id, date)))?;
            txn.delete(EntityRef::BillOverride(id))?;
            Ok(())
        })
    }

    /// Occurrences in a window with their paid/pending/overdue status
    pub fn due_occurrences(&self, bill_id: BillId, window: Period, today: NaiveDate) -> EngineResult<Vec<ScheduledOccurrence>> {
        self.storage.read(|data| {
            let bill = data.bills.require(bill_id)?;
            bill_occurrences(data, bill, window, today)
        })?
    }

    /// Recorded payments, oldest first
    pub fn payments(&self, bill_id: BillId) -> EngineResult<Vec<BillPayment>> {
        self.storage.read(|data| {
            data.bills.require(bill_id)?;
            let mut payments: Vec<BillPayment> = data.bill_payments_for(bill_id).cloned().collect();
            payments.sort_by_key(|p| p.payment_date);
            Ok(payments)
        })?
    }

    /// Confirm one occurrence as paid
    ///
    /// Creates the payment and a linked expense entry atomically. The date
    /// must be one of the bill's scheduled dates. A date that is already paid
    /// is rejected or replaced according to the duplicate policy.
    pub fn record_payment(&self, bill_id: BillId, date: NaiveDate, options: PaymentOptions) -> EngineResult<BillPayment> {
        let policy = self.duplicate_policy;
        let payment = self.storage.write(|txn| {
            let bill = txn.bills.require(bill_id)?.clone();
            if !bill.rule.active {
                return Err(EngineError::Validation(format!(
                    "Bill '{}' is paused; resume it before recording a payment",
                    bill.name
                )));
            }
            if !is_scheduled_on(&bill.rule, date) {
                return Err(EngineError::Config(format!(
                    "{} is not a scheduled date for bill '{}'",
                    date, bill.name
                )));
            }

            let account = options.account.or(bill.account_id).ok_or_else(|| {
                EngineError::Validation(format!("Bill '{}' has no paying account", bill.name))
            })?;
            let amount = match options.amount {
                Some(amount) => amount,
                None => txn
                    .bill_override_on(bill.id, date)
                    .map_or(bill.rule.amount, |o| o.amount),
            };
            if !amount.is_positive() {
                return Err(EngineError::Validation(format!(
                    "Payment amount must be positive: {}",
                    amount
                )));
            }

            if let Some(existing) = txn.bill_payment_on(bill.id, date).cloned() {
                match policy {
                    DuplicatePaymentPolicy::Reject => {
                        return Err(EngineError::duplicate(
                            "BillPayment",
                            format!("{} on {}", bill.name, date),
                        ));
                    }
                    DuplicatePaymentPolicy::Replace => {
                        debug!(payment = %existing.id, "replacing earlier payment");
                        remove_payment(txn, &existing)?;
                    }
                }
            }

            let mut entry = Transaction::expense(account, amount, date)
                .with_description(format!("Bill payment: {}", bill.name));
            entry.bill_id = Some(bill.id);
            entry.envelope_id = options.envelope;
            let transaction_id = post_entry(txn, entry)?;

            let mut payment = BillPayment::new(bill.id, account, date, amount);
            payment.transaction_id = Some(transaction_id);
            txn.insert(payment.clone())?;
            Ok(payment)
        })?;

        info!(bill = %bill_id, date = %date, amount = %payment.amount, "bill paid");
        Ok(payment)
    }

    /// Undo a payment and its ledger entry
    pub fn undo_payment(&self, bill_id: BillId, date: NaiveDate) -> EngineResult<BillPayment> {
        self.storage.write(|txn| {
            let payment = txn
                .bill_payment_on(bill_id, date)
                .cloned()
                .ok_or_else(|| EngineError::not_found("BillPayment", format!("{} on {}", bill_id, date)))?;
            remove_payment(txn, &payment)?;
            Ok(payment)
        })
    }

    /// Unpaid occurrences falling within each bill's reminder lead time
    pub fn reminders_due(&self, today: NaiveDate) -> EngineResult<Vec<Reminder>> {
        self.storage.read(|data| {
            let mut reminders = Vec::new();
            for bill in data.bills.iter().filter(|b| b.rule.active) {
                let horizon = today
                    .checked_add_signed(Duration::days(i64::from(bill.reminder_days_before)))
                    .unwrap_or(NaiveDate::MAX);
                let window = Period::new(today, horizon)?;
                for occurrence in bill_occurrences(data, bill, window, today)? {
                    if occurrence.status.is_settled() {
                        continue;
                    }
                    reminders.push(Reminder {
                        bill_id: bill.id,
                        name: bill.name.clone(),
                        due_date: occurrence.date,
                        amount: occurrence.amount,
                        days_until: (occurrence.date - today).num_days(),
                    });
                }
            }
            reminders.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.name.cmp(&b.name)));
            Ok(reminders)
        })?
    }
}

/// Remove a payment together with the entry that settled it
fn remove_payment(txn: &mut WriteTxn<'_>, payment: &BillPayment) -> EngineResult<()> {
    match payment.transaction_id {
        Some(entry) if txn.transactions.contains(entry) => {
            // the payment cascades from its entry
            txn.delete(EntityRef::Transaction(entry))?;
        }
        _ => {
            txn.delete(EntityRef::BillPayment(payment.id))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountKind, RecurrenceKind};
    use crate::services::LedgerService;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Storage, AccountId, Bill) {
        let storage = Storage::in_memory();
        let account = Account::new("Checking", AccountKind::Checking, Money::from_units(1000));
        let account_id = account.id;
        storage.write(|txn| txn.insert(account)).unwrap();

        let bill = BillService::new(&storage)
            .create(
                "Rent",
                RecurringRule::new(Money::from_units(100), RecurrenceKind::Monthly, date(2024, 1, 15)),
                Some(account_id),
            )
            .unwrap();
        (storage, account_id, bill)
    }

    #[test]
    fn test_payment_creates_linked_entry_atomically() {
        let (storage, account, bill) = setup();
        let service = BillService::new(&storage);

        let payment = service
            .record_payment(bill.id, date(2024, 1, 15), PaymentOptions::default())
            .unwrap();
        assert_eq!(payment.amount, Money::from_units(100));

        let entry = LedgerService::new(&storage)
            .get(payment.transaction_id.unwrap())
            .unwrap();
        assert_eq!(entry.bill_id, Some(bill.id));
        assert_eq!(entry.amount, Money::from_units(100));
        assert_eq!(
            LedgerService::new(&storage).current_balance(account).unwrap(),
            Money::from_units(900)
        );
    }

    #[test]
    fn test_payment_uses_override_amount_unless_given() {
        let (storage, _, bill) = setup();
        let service = BillService::new(&storage);
        service
            .add_override(bill.id, date(2024, 3, 15), Money::from_units(150))
            .unwrap();

        let overridden = service
            .record_payment(bill.id, date(2024, 3, 15), PaymentOptions::default())
            .unwrap();
        assert_eq!(overridden.amount, Money::from_units(150));

        let explicit = service
            .record_payment(
                bill.id,
                date(2024, 4, 15),
                PaymentOptions {
                    amount: Some(Money::from_units(120)),
                    ..PaymentOptions::default()
                },
            )
            .unwrap();
        assert_eq!(explicit.amount, Money::from_units(120));
    }

    #[test]
    fn test_duplicate_override_rejected() {
        let (storage, _, bill) = setup();
        let service = BillService::new(&storage);
        service
            .add_override(bill.id, date(2024, 3, 15), Money::from_units(150))
            .unwrap();
        let err = service
            .add_override(bill.id, date(2024, 3, 15), Money::from_units(175))
            .unwrap_err();
        assert!(matches!(err, EngineError::Duplicate { .. }));
    }

    #[test]
    fn test_repaying_rejected_by_default() {
        let (storage, _, bill) = setup();
        let service = BillService::new(&storage);
        service
            .record_payment(bill.id, date(2024, 1, 15), PaymentOptions::default())
            .unwrap();

        let err = service
            .record_payment(bill.id, date(2024, 1, 15), PaymentOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Duplicate { .. }));
        assert_eq!(storage.read(|d| d.transactions.len()).unwrap(), 1);
    }

    #[test]
    fn test_repaying_replaces_under_replace_policy() {
        let (storage, account, bill) = setup();
        let service = BillService::new(&storage).with_duplicate_policy(DuplicatePaymentPolicy::Replace);
        service
            .record_payment(bill.id, date(2024, 1, 15), PaymentOptions::default())
            .unwrap();
        service
            .record_payment(
                bill.id,
                date(2024, 1, 15),
                PaymentOptions {
                    amount: Some(Money::from_units(90)),
                    ..PaymentOptions::default()
                },
            )
            .unwrap();

        assert_eq!(storage.read(|d| d.transactions.len()).unwrap(), 1);
        assert_eq!(service.payments(bill.id).unwrap().len(), 1);
        assert_eq!(
            LedgerService::new(&storage).current_balance(account).unwrap(),
            Money::from_units(910)
        );
    }

    #[test]
    fn test_unscheduled_date_and_bad_amount() {
        let (storage, _, bill) = setup();
        let service = BillService::new(&storage);

        let err = service
            .record_payment(bill.id, date(2024, 1, 16), PaymentOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let err = service
            .record_payment(
                bill.id,
                date(2024, 1, 15),
                PaymentOptions {
                    amount: Some(Money::zero()),
                    ..PaymentOptions::default()
                },
            )
            .unwrap_err();
        assert!(err.is_validation());
        assert!(service.payments(bill.id).unwrap().is_empty());
    }

    #[test]
    fn test_status_and_undo() {
        let (storage, account, bill) = setup();
        let service = BillService::new(&storage);
        service
            .record_payment(bill.id, date(2024, 1, 15), PaymentOptions::default())
            .unwrap();

        let window = Period::new(date(2024, 1, 1), date(2024, 3, 31)).unwrap();
        let statuses: Vec<_> = service
            .due_occurrences(bill.id, window, date(2024, 2, 20))
            .unwrap()
            .into_iter()
            .map(|o| o.status.to_string())
            .collect();
        assert_eq!(statuses, vec!["paid", "overdue", "pending"]);

        service.undo_payment(bill.id, date(2024, 1, 15)).unwrap();
        assert!(service.payments(bill.id).unwrap().is_empty());
        assert_eq!(
            LedgerService::new(&storage).current_balance(account).unwrap(),
            Money::from_units(1000)
        );
    }

    #[test]
    fn test_deleting_entry_unpays_occurrence() {
        let (storage, _, bill) = setup();
        let service = BillService::new(&storage);
        let payment = service
            .record_payment(bill.id, date(2024, 1, 15), PaymentOptions::default())
            .unwrap();

        LedgerService::new(&storage)
            .delete(payment.transaction_id.unwrap())
            .unwrap();
        assert!(service.payments(bill.id).unwrap().is_empty());
    }

    #[test]
    fn test_reminders_within_lead_time() {
        let (storage, _, bill) = setup();
        let service = BillService::new(&storage);

        let reminders = service.reminders_due(date(2024, 2, 12)).unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].bill_id, bill.id);
        assert_eq!(reminders[0].days_until, 3);

        assert!(service.reminders_due(date(2024, 2, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_reminder_horizon_clamps_at_last_date() {
        let (storage, account, _) = setup();
        let service = BillService::new(&storage);
        let last = service
            .create(
                "Final",
                RecurringRule::new(Money::from_units(10), RecurrenceKind::OneTime, NaiveDate::MAX),
                Some(account),
            )
            .unwrap();

        let today = NaiveDate::MAX.pred_opt().unwrap();
        let reminders = service.reminders_due(today).unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].bill_id, last.id);
        assert_eq!(reminders[0].days_until, 1);
    }

    #[test]
    fn test_paused_bill_rejects_payment() {
        let (storage, account, bill) = setup();
        let service = BillService::new(&storage);
        service.set_active(bill.id, false).unwrap();

        let err = service
            .record_payment(bill.id, date(2024, 1, 15), PaymentOptions::default())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(service.payments(bill.id).unwrap().is_empty());
        assert_eq!(
            LedgerService::new(&storage).current_balance(account).unwrap(),
            Money::from_units(1000)
        );

        service.set_active(bill.id, true).unwrap();
        service
            .record_payment(bill.id, date(2024, 1, 15), PaymentOptions::default())
            .unwrap();
    }

    #[test]
    fn test_create_with_missing_account_is_referential() {
        let storage = Storage::in_memory();
        let err = BillService::new(&storage)
            .create(
                "Phone",
                RecurringRule::new(Money::from_units(40), RecurrenceKind::Monthly, date(2024, 1, 1)),
                Some(AccountId::new()),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Referential { .. }));
    }
}
