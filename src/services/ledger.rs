//! Ledger service
//!
//! Records, edits and removes ledger entries. Every mutation runs inside one
//! storage write: references are checked before anything changes and the
//! cached balance of each touched account is recomputed before commit.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::debug;

use super::expander::is_scheduled_on;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AccountId, BillPayment, EntityRef, Money, Period, Transaction, TransactionId, TransactionKind,
};
use crate::storage::{Dataset, DeleteOutcome, Storage, WriteTxn};

/// Service for ledger entries and account balances
pub struct LedgerService<'a> {
    storage: &'a Storage,
}

/// Check an entry's own invariants
pub(crate) fn validate_entry(entry: &Transaction) -> EngineResult<()> {
    entry
        .validate()
        .map_err(|e| EngineError::Validation(e.to_string()))
}

/// Insert an entry inside an open write and refresh the balances it touches
pub(crate) fn post_entry(txn: &mut WriteTxn<'_>, entry: Transaction) -> EngineResult<TransactionId> {
    validate_entry(&entry)?;
    txn.check_transaction_refs(&entry)?;
    let accounts: Vec<AccountId> = entry.touched_accounts().collect();
    let id = txn.insert(entry)?;
    for account in accounts {
        txn.refresh_balance(account)?;
    }
    Ok(id)
}

/// Carry an edit of a settling entry over to its bill payment
///
/// The entry must stay an expense for the same bill, and a new date must be
/// a scheduled date not already paid.
fn sync_bill_payment(txn: &mut WriteTxn<'_>, entry: &Transaction) -> EngineResult<()> {
    let Some(payment) = txn
        .bill_payments
        .iter()
        .find(|p| p.transaction_id == Some(entry.id))
        .cloned()
    else {
        return Ok(());
    };

    if entry.kind != TransactionKind::Expense || entry.bill_id != Some(payment.bill_id) {
        return Err(EngineError::Validation(format!(
            "Entry {} settles a bill payment and must remain an expense for that bill",
            entry.id
        )));
    }
    if entry.date != payment.payment_date {
        let bill = txn.bills.require(payment.bill_id)?;
        if !is_scheduled_on(&bill.rule, entry.date) {
            return Err(EngineError::Config(format!(
                "{} is not a scheduled date for bill '{}'",
                entry.date, bill.name
            )));
        }
        if txn.bill_payment_on(payment.bill_id, entry.date).is_some() {
            return Err(EngineError::duplicate(
                "BillPayment",
                format!("{} on {}", bill.name, entry.date),
            ));
        }
    }

    txn.modify::<BillPayment>(payment.id, |p| {
        p.payment_date = entry.date;
        p.amount = entry.amount;
        p.account_id = entry.account_id;
    })?;
    debug!(payment = %payment.id, "bill payment follows edited entry");
    Ok(())
}

/// Compare one account's cached balance with its ledger
pub(crate) fn check_balance(data: &Dataset, account: AccountId) -> EngineResult<Money> {
    let cached = data.accounts.require(account)?.current_balance;
    let computed = data.ledger_balance(account, None)?;
    if cached != computed {
        return Err(EngineError::Consistency {
            account: account.to_string(),
            cached,
            computed,
        });
    }
    Ok(computed)
}

impl<'a> LedgerService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Append an entry to the ledger
    pub fn record(&self, entry: Transaction) -> EngineResult<Transaction> {
        let recorded = entry.clone();
        self.storage.write(|txn| post_entry(txn, entry))?;
        debug!(id = %recorded.id, kind = ?recorded.kind, amount = %recorded.amount, "recorded entry");
        Ok(recorded)
    }

    /// Replace an existing entry
    ///
    /// Balances of accounts touched before or after the edit are recomputed.
    /// A bill payment settled by the entry takes the new amount, date and
    /// account in the same write.
    pub fn update(&self, entry: Transaction) -> EngineResult<Transaction> {
        validate_entry(&entry)?;
        let updated = entry.clone();

        self.storage.write(|txn| {
            txn.check_transaction_refs(&entry)?;
            sync_bill_payment(txn, &entry)?;
            let mut accounts: BTreeSet<AccountId> = entry.touched_accounts().collect();
            let previous = txn.update(entry)?;
            accounts.extend(previous.touched_accounts());
            for account in accounts {
                txn.refresh_balance(account)?;
            }
            Ok(())
        })?;

        Ok(updated)
    }

    /// Remove an entry
    ///
    /// A bill payment that points at the entry goes with it, which returns
    /// the occurrence to unpaid.
    pub fn delete(&self, id: TransactionId) -> EngineResult<DeleteOutcome> {
        self.storage.write(|txn| txn.delete(EntityRef::Transaction(id)))
    }

    pub fn get(&self, id: TransactionId) -> EngineResult<Transaction> {
        self.storage
            .read(|data| data.transactions.require(id).cloned())?
    }

    /// Entries touching an account, oldest first, optionally limited to a range
    pub fn list_for_account(&self, account: AccountId, range: Option<Period>) -> EngineResult<Vec<Transaction>> {
        self.storage.read(|data| {
            data.accounts.require(account)?;
            let mut entries: Vec<Transaction> = data
                .transactions_for_account(account)
                .filter(|t| range.map_or(true, |r| r.contains(t.date)))
                .cloned()
                .collect();
            entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.recorded_at.cmp(&b.recorded_at)));
            Ok(entries)
        })?
    }

    /// Balance computed from the ledger, optionally as of a date
    pub fn balance(&self, account: AccountId, as_of: Option<NaiveDate>) -> EngineResult<Money> {
        self.storage.read(|data| data.ledger_balance(account, as_of))?
    }

    /// The cached balance stored on the account row
    pub fn current_balance(&self, account: AccountId) -> EngineResult<Money> {
        self.storage
            .read(|data| data.accounts.require(account).map(|a| a.current_balance))?
    }

    /// Fail with a consistency error if the cache disagrees with the ledger
    pub fn verify_balance(&self, account: AccountId) -> EngineResult<Money> {
        self.storage.read(|data| check_balance(data, account))?
    }

    /// Verify every account, stopping at the first mismatch
    pub fn verify_all(&self) -> EngineResult<usize> {
        self.storage.read(|data| {
            for account in data.accounts.iter() {
                check_balance(data, account.id)?;
            }
            Ok(data.accounts.len())
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountKind, EnvelopeId};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Storage, AccountId, AccountId) {
        let storage = Storage::in_memory();
        let checking = Account::new("Checking", AccountKind::Checking, Money::from_units(1000));
        let savings = Account::new("Savings", AccountKind::Savings, Money::zero());
        let ids = (checking.id, savings.id);
        storage
            .write(|txn| {
                txn.insert(checking)?;
                txn.insert(savings)?;
                Ok(())
            })
            .unwrap();
        (storage, ids.0, ids.1)
    }

    #[test]
    fn test_income_then_expense_updates_cache() {
        let (storage, checking, _) = setup();
        let ledger = LedgerService::new(&storage);

        ledger
            .record(Transaction::income(checking, Money::from_units(500), date(2024, 1, 1)))
            .unwrap();
        ledger
            .record(Transaction::expense(checking, Money::from_units(200), date(2024, 1, 2)))
            .unwrap();

        assert_eq!(ledger.current_balance(checking).unwrap(), Money::from_units(1300));
        assert_eq!(ledger.verify_balance(checking).unwrap(), Money::from_units(1300));
    }

    #[test]
    fn test_transfer_moves_between_accounts() {
        let (storage, checking, savings) = setup();
        let ledger = LedgerService::new(&storage);

        ledger
            .record(Transaction::transfer(checking, savings, Money::from_units(300), date(2024, 1, 5)))
            .unwrap();

        assert_eq!(ledger.current_balance(checking).unwrap(), Money::from_units(700));
        assert_eq!(ledger.current_balance(savings).unwrap(), Money::from_units(300));
        assert_eq!(ledger.verify_all().unwrap(), 2);
    }

    #[test]
    fn test_missing_reference_changes_nothing() {
        let (storage, checking, _) = setup();
        let ledger = LedgerService::new(&storage);

        let err = ledger
            .record(
                Transaction::expense(checking, Money::from_units(20), date(2024, 1, 3))
                    .with_envelope(EnvelopeId::new()),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Referential { .. }));
        assert_eq!(storage.read(|d| d.transactions.len()).unwrap(), 0);
        assert_eq!(ledger.current_balance(checking).unwrap(), Money::from_units(1000));
    }

    #[test]
    fn test_negative_amount_is_validation_error() {
        let (storage, checking, _) = setup();
        let ledger = LedgerService::new(&storage);
        let err = ledger
            .record(Transaction::expense(checking, Money::from_cents(-1), date(2024, 1, 3)))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_update_moving_entry_refreshes_both_accounts() {
        let (storage, checking, savings) = setup();
        let ledger = LedgerService::new(&storage);
        let mut entry = ledger
            .record(Transaction::expense(checking, Money::from_units(40), date(2024, 1, 3)))
            .unwrap();

        entry.account_id = savings;
        ledger.update(entry).unwrap();

        assert_eq!(ledger.current_balance(checking).unwrap(), Money::from_units(1000));
        assert_eq!(ledger.current_balance(savings).unwrap(), Money::from_units(-40));
        ledger.verify_all().unwrap();
    }

    fn paid_rent(storage: &Storage, account: AccountId) -> (crate::models::Bill, Transaction) {
        use crate::models::{RecurrenceKind, RecurringRule};
        use crate::services::{BillService, PaymentOptions};

        let bills = BillService::new(storage);
        let bill = bills
            .create(
                "Rent",
                RecurringRule::new(Money::from_units(100), RecurrenceKind::Monthly, date(2024, 1, 15)),
                Some(account),
            )
            .unwrap();
        let payment = bills
            .record_payment(bill.id, date(2024, 1, 15), PaymentOptions::default())
            .unwrap();
        let entry = LedgerService::new(storage)
            .get(payment.transaction_id.unwrap())
            .unwrap();
        (bill, entry)
    }

    #[test]
    fn test_update_of_settling_entry_moves_payment() {
        let (storage, checking, _) = setup();
        let (bill, mut entry) = paid_rent(&storage, checking);

        entry.amount = Money::from_units(40);
        entry.date = date(2024, 3, 15);
        LedgerService::new(&storage).update(entry).unwrap();

        let payments: Vec<BillPayment> = storage
            .read(|d| d.bill_payments_for(bill.id).cloned().collect())
            .unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].payment_date, date(2024, 3, 15));
        assert_eq!(payments[0].amount, Money::from_units(40));
        assert!(storage.read(|d| d.bill_payment_on(bill.id, date(2024, 1, 15)).is_none()).unwrap());
        assert_eq!(
            LedgerService::new(&storage).current_balance(checking).unwrap(),
            Money::from_units(960)
        );
    }

    #[test]
    fn test_update_of_settling_entry_rejects_broken_pair() {
        let (storage, checking, _) = setup();
        let (bill, entry) = paid_rent(&storage, checking);
        let ledger = LedgerService::new(&storage);

        let mut unscheduled = entry.clone();
        unscheduled.date = date(2024, 3, 1);
        let err = ledger.update(unscheduled).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let mut income = entry.clone();
        income.kind = TransactionKind::Income;
        assert!(ledger.update(income).unwrap_err().is_validation());

        let payment = storage
            .read(|d| d.bill_payment_on(bill.id, date(2024, 1, 15)).cloned())
            .unwrap()
            .unwrap();
        assert_eq!(payment.amount, Money::from_units(100));
        assert_eq!(ledger.get(entry.id).unwrap().date, date(2024, 1, 15));
    }

    #[test]
    fn test_record_overflowing_balance_is_rejected() {
        let (storage, checking, _) = setup();
        let ledger = LedgerService::new(&storage);
        let huge = Money::parse("90000000000000000.00").unwrap();

        ledger
            .record(Transaction::income(checking, huge, date(2024, 1, 1)))
            .unwrap();
        let err = ledger
            .record(Transaction::income(checking, huge, date(2024, 1, 2)))
            .unwrap_err();
        assert!(err.is_validation());

        assert_eq!(storage.read(|d| d.transactions.len()).unwrap(), 1);
        assert_eq!(
            ledger.current_balance(checking).unwrap(),
            huge + Money::from_units(1000)
        );
        ledger.verify_all().unwrap();
    }

    #[test]
    fn test_delete_restores_balance() {
        let (storage, checking, _) = setup();
        let ledger = LedgerService::new(&storage);
        let entry = ledger
            .record(Transaction::expense(checking, Money::from_units(40), date(2024, 1, 3)))
            .unwrap();

        ledger.delete(entry.id).unwrap();
        assert_eq!(ledger.current_balance(checking).unwrap(), Money::from_units(1000));
        assert!(ledger.get(entry.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_balance_as_of_and_listing_order() {
        let (storage, checking, _) = setup();
        let ledger = LedgerService::new(&storage);
        ledger
            .record(Transaction::expense(checking, Money::from_units(10), date(2024, 2, 1)))
            .unwrap();
        ledger
            .record(Transaction::income(checking, Money::from_units(50), date(2024, 1, 1)))
            .unwrap();

        assert_eq!(
            ledger.balance(checking, Some(date(2024, 1, 31))).unwrap(),
            Money::from_units(1050)
        );
        let listed = ledger.list_for_account(checking, None).unwrap();
        assert_eq!(listed[0].date, date(2024, 1, 1));
        assert_eq!(listed[1].date, date(2024, 2, 1));
    }

    #[test]
    fn test_tampered_cache_is_consistency_error() {
        let (storage, checking, _) = setup();
        storage
            .write(|txn| {
                txn.modify::<Account>(checking, |a| a.current_balance = Money::from_units(1))?;
                Ok(())
            })
            .unwrap();

        let err = LedgerService::new(&storage).verify_balance(checking).unwrap_err();
        assert!(matches!(err, EngineError::Consistency { .. }));
    }
}
