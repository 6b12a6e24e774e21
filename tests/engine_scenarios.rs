//! End-to-end behaviour of the engine through its public services

use std::sync::atomic::{AtomicBool, Ordering};

use cashflow_engine::config::{CashflowPaths, DuplicatePaymentPolicy};
use cashflow_engine::models::{
    Account, AccountId, AccountKind, Envelope, Money, Period, RecurrenceKind, RecurringRule,
    TableKind, Transaction,
};
use cashflow_engine::services::{
    occurrences_in_range, AccountService, BillService, EnvelopeService, LedgerService,
    OccurrenceStatus, PaymentOptions, RuleService,
};
use cashflow_engine::storage::{OverrideMap, Storage};
use cashflow_engine::ErrorKind;
use chrono::NaiveDate;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn account(storage: &Storage, name: &str, units: i64) -> AccountId {
    AccountService::new(storage)
        .create(name, AccountKind::Checking, Money::from_units(units))
        .unwrap()
        .id
}

#[test]
fn monthly_bill_expands_to_each_fifteenth() {
    let rule = RecurringRule::new(Money::from_units(100), RecurrenceKind::Monthly, date(2024, 1, 15));
    let occurrences = occurrences_in_range(&rule, &OverrideMap::new(), date(2024, 1, 1), date(2024, 4, 30)).unwrap();

    let dates: Vec<NaiveDate> = occurrences.iter().map(|o| o.date).collect();
    assert_eq!(
        dates,
        vec![date(2024, 1, 15), date(2024, 2, 15), date(2024, 3, 15), date(2024, 4, 15)]
    );
    assert!(occurrences.iter().all(|o| o.amount == Money::from_units(100)));

    let again = occurrences_in_range(&rule, &OverrideMap::new(), date(2024, 1, 1), date(2024, 4, 30)).unwrap();
    assert_eq!(occurrences, again);
}

#[test]
fn bill_override_replaces_one_occurrence() {
    let storage = Storage::in_memory();
    let bills = BillService::new(&storage);
    let rule = RecurringRule::new(Money::from_units(100), RecurrenceKind::Monthly, date(2024, 1, 15));
    let bill = bills.create("Phone", rule, None).unwrap();
    bills.add_override(bill.id, date(2024, 3, 15), Money::from_units(150)).unwrap();

    let window = Period::new(date(2024, 1, 1), date(2024, 4, 30)).unwrap();
    let occurrences = bills.due_occurrences(bill.id, window, date(2024, 1, 1)).unwrap();
    let amounts: Vec<(NaiveDate, Money)> = occurrences.iter().map(|o| (o.date, o.amount)).collect();
    assert_eq!(
        amounts,
        vec![
            (date(2024, 1, 15), Money::from_units(100)),
            (date(2024, 2, 15), Money::from_units(100)),
            (date(2024, 3, 15), Money::from_units(150)),
            (date(2024, 4, 15), Money::from_units(100)),
        ]
    );
}

#[test]
fn balance_as_of_follows_ledger() {
    let storage = Storage::in_memory();
    let checking = account(&storage, "Checking", 500);
    let ledger = LedgerService::new(&storage);

    ledger
        .record(Transaction::income(checking, Money::from_units(200), date(2024, 1, 1)))
        .unwrap();
    ledger
        .record(Transaction::expense(checking, Money::from_units(50), date(2024, 1, 2)))
        .unwrap();

    assert_eq!(ledger.balance(checking, Some(date(2024, 1, 2))).unwrap(), Money::from_units(650));
    assert_eq!(ledger.balance(checking, Some(date(2023, 12, 31))).unwrap(), Money::from_units(500));
    assert_eq!(ledger.current_balance(checking).unwrap(), Money::from_units(650));
    assert_eq!(ledger.verify_balance(checking).unwrap(), Money::from_units(650));
}

#[test]
fn transfer_to_missing_account_changes_nothing() {
    let storage = Storage::in_memory();
    let checking = account(&storage, "Checking", 500);
    let ledger = LedgerService::new(&storage);

    let err = ledger
        .record(Transaction::transfer(checking, AccountId::new(), Money::from_units(100), date(2024, 1, 1)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Referential);
    assert_eq!(ledger.current_balance(checking).unwrap(), Money::from_units(500));
    assert!(ledger.list_for_account(checking, None).unwrap().is_empty());
}

#[test]
fn concurrent_transfers_never_show_half_applied() {
    let storage = Storage::in_memory();
    let a = account(&storage, "A", 1000);
    let b = account(&storage, "B", 1000);
    let total = Money::from_units(2000);
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        let writer = scope.spawn(|| {
            let ledger = LedgerService::new(&storage);
            for i in 0..50 {
                let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                ledger
                    .record(Transaction::transfer(from, to, Money::from_units(10), date(2024, 1, 1)))
                    .unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });

        while !done.load(Ordering::SeqCst) {
            let sum = storage
                .read(|data| data.accounts.iter().map(|acc| acc.current_balance).sum::<Money>())
                .unwrap();
            assert_eq!(sum, total);
        }
        writer.join().unwrap();
    });

    assert_eq!(LedgerService::new(&storage).verify_all().unwrap(), 2);
}

#[test]
fn carry_over_rolls_remainder_into_next_period() {
    let storage = Storage::in_memory();
    let checking = account(&storage, "Checking", 5000);
    let envelopes = EnvelopeService::new(&storage);
    let groceries = envelopes
        .create(
            Envelope::new("Groceries", Money::from_units(300), RecurrenceKind::Monthly)
                .anchored_at(date(2024, 1, 1))
                .with_carry_over(true),
        )
        .unwrap();

    LedgerService::new(&storage)
        .record(Transaction::expense(checking, Money::from_units(100), date(2024, 1, 20)).with_envelope(groceries.id))
        .unwrap();

    let january = envelopes.status_for_period(groceries.id, date(2024, 1, 1)).unwrap();
    assert_eq!(january.remaining, Money::from_units(200));

    let february = envelopes.status_for_period(groceries.id, date(2024, 2, 1)).unwrap();
    assert_eq!(february.period, Period::new(date(2024, 2, 1), date(2024, 2, 29)).unwrap());
    assert_eq!(february.allocated, Money::from_units(500));
    assert_eq!(february.carried_over, Money::from_units(200));
}

#[test]
fn envelope_transfer_conserves_budget() {
    let storage = Storage::in_memory();
    let envelopes = EnvelopeService::new(&storage);
    let create = |name: &str| {
        envelopes
            .create(Envelope::new(name, Money::from_units(200), RecurrenceKind::Monthly).anchored_at(date(2024, 1, 1)))
            .unwrap()
    };
    let dining = create("Dining");
    let fun = create("Fun");

    let before_dining = envelopes.status_for_period(dining.id, date(2024, 1, 10)).unwrap();
    let before_fun = envelopes.status_for_period(fun.id, date(2024, 1, 10)).unwrap();

    envelopes
        .transfer(dining.id, fun.id, Money::from_units(50), date(2024, 1, 10), None)
        .unwrap();

    let after_dining = envelopes.status_for_period(dining.id, date(2024, 1, 10)).unwrap();
    let after_fun = envelopes.status_for_period(fun.id, date(2024, 1, 10)).unwrap();
    assert_eq!(after_dining.consumed, before_dining.consumed + Money::from_units(50));
    assert_eq!(after_fun.consumed, before_fun.consumed - Money::from_units(50));
    assert_eq!(
        after_dining.remaining + after_fun.remaining,
        before_dining.remaining + before_fun.remaining
    );

    let err = envelopes
        .transfer(dining.id, fun.id, Money::zero(), date(2024, 1, 10), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn envelope_periods_tile_around_allocations() {
    let storage = Storage::in_memory();
    let envelopes = EnvelopeService::new(&storage);
    let fuel = envelopes
        .create(Envelope::new("Fuel", Money::from_units(120), RecurrenceKind::BiWeekly).anchored_at(date(2024, 1, 3)))
        .unwrap();
    envelopes
        .allocate(fuel.id, date(2024, 2, 20), Money::from_units(90), None)
        .unwrap();

    let range = Period::new(date(2024, 1, 1), date(2024, 6, 30)).unwrap();
    let periods = envelopes.periods(fuel.id, range).unwrap();
    assert!(periods.first().unwrap().contains(range.start));
    assert!(periods.last().unwrap().contains(range.end));
    for pair in periods.windows(2) {
        assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
    }
}

#[test]
fn deleting_payment_entry_returns_bill_to_unpaid() {
    let storage = Storage::in_memory();
    let checking = account(&storage, "Checking", 2000);
    let bills = BillService::new(&storage);
    let rule = RecurringRule::new(Money::from_units(1200), RecurrenceKind::Monthly, date(2024, 1, 1));
    let rent = bills.create("Rent", rule, Some(checking)).unwrap();

    let payment = bills
        .record_payment(rent.id, date(2024, 1, 1), PaymentOptions::default())
        .unwrap();
    let ledger = LedgerService::new(&storage);
    assert_eq!(ledger.current_balance(checking).unwrap(), Money::from_units(800));

    ledger.delete(payment.transaction_id.unwrap()).unwrap();
    assert_eq!(ledger.current_balance(checking).unwrap(), Money::from_units(2000));

    let window = Period::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
    let occurrences = bills.due_occurrences(rent.id, window, date(2024, 1, 10)).unwrap();
    assert_eq!(occurrences[0].status, OccurrenceStatus::Overdue);
    assert!(bills.payments(rent.id).unwrap().is_empty());
}

#[test]
fn replace_policy_keeps_one_payment_per_date() {
    let storage = Storage::in_memory();
    let checking = account(&storage, "Checking", 2000);
    let bills = BillService::new(&storage).with_duplicate_policy(DuplicatePaymentPolicy::Replace);
    let rule = RecurringRule::new(Money::from_units(100), RecurrenceKind::Monthly, date(2024, 1, 5));
    let bill = bills.create("Power", rule, Some(checking)).unwrap();

    bills.record_payment(bill.id, date(2024, 1, 5), PaymentOptions::default()).unwrap();
    let options = PaymentOptions {
        amount: Some(Money::from_units(120)),
        ..PaymentOptions::default()
    };
    bills.record_payment(bill.id, date(2024, 1, 5), options).unwrap();

    let payments = bills.payments(bill.id).unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, Money::from_units(120));
    assert_eq!(
        LedgerService::new(&storage).current_balance(checking).unwrap(),
        Money::from_units(1880)
    );
}

#[test]
fn first_matching_rule_wins() {
    let storage = Storage::in_memory();
    let envelopes = EnvelopeService::new(&storage);
    let groceries = envelopes
        .create(Envelope::new("Groceries", Money::from_units(400), RecurrenceKind::Monthly))
        .unwrap();
    let coffee = envelopes
        .create(Envelope::new("Coffee", Money::from_units(40), RecurrenceKind::Monthly))
        .unwrap();

    let rules = RuleService::new(&storage);
    rules.add(groceries.id, "market").unwrap();
    rules.add(coffee.id, "coffee").unwrap();

    assert_eq!(rules.suggest_for("Coffee at the Market").unwrap(), Some(groceries.id));
    assert_eq!(rules.suggest_for("Corner coffee").unwrap(), Some(coffee.id));
    assert_eq!(rules.suggest_for("Rent").unwrap(), None);
}

#[test]
fn commits_notify_subscribers() {
    let storage = Storage::in_memory();
    let changes = storage.subscribe().unwrap();
    let checking = account(&storage, "Checking", 100);

    LedgerService::new(&storage)
        .record(Transaction::expense(checking, Money::from_units(10), date(2024, 1, 1)))
        .unwrap();

    let first = changes.try_recv().unwrap();
    assert!(first.touches(TableKind::Accounts));
    let second = changes.try_recv().unwrap();
    assert!(second.touches(TableKind::Transactions));
    assert!(second.touches(TableKind::Accounts));
}

#[test]
fn file_storage_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let paths = CashflowPaths::with_base_dir(dir.path().to_path_buf());

    let (checking, rent) = {
        let storage = Storage::open(&paths).unwrap();
        let checking = account(&storage, "Checking", 2000);
        let bills = BillService::new(&storage);
        let rule = RecurringRule::new(Money::from_units(1200), RecurrenceKind::Monthly, date(2024, 1, 1));
        let rent = bills.create("Rent", rule, Some(checking)).unwrap();
        bills
            .record_payment(rent.id, date(2024, 1, 1), PaymentOptions::default())
            .unwrap();
        (checking, rent.id)
    };

    let storage = Storage::open(&paths).unwrap();
    let ledger = LedgerService::new(&storage);
    assert_eq!(ledger.verify_balance(checking).unwrap(), Money::from_units(800));
    assert_eq!(BillService::new(&storage).payments(rent).unwrap().len(), 1);
    assert!(!storage.audit_trail().unwrap().is_empty());
}

#[test]
fn account_row_reports_ledger_balance() {
    let storage = Storage::in_memory();
    let account = Account::new("Cash", AccountKind::Cash, Money::from_units(20));
    let id = account.id;
    storage.write(|txn| txn.insert(account)).unwrap();

    let summaries = AccountService::new(&storage).list_with_balances().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].account.id, id);
    assert_eq!(summaries[0].balance, Money::from_units(20));
}
