//! The full set of engine tables plus the queries and deletion rules that
//! span them
//!
//! A `Dataset` is a plain value: the store hands out shared snapshots for
//! reads and a private copy for each write transaction.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::table::{Record, Table};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Account, AccountId, Bill, BillId, BillOverride, BillPayment, CategorizationRule, EntityRef,
    Envelope, EnvelopeAllocation, EnvelopeId, EnvelopeTransfer, Income, IncomeId, IncomeOverride,
    Money, OnDelete, Period, Relation, TableKind, Transaction, TransactionKind,
};

/// Override amounts keyed by date, as consumed by the recurrence expander
pub type OverrideMap = BTreeMap<NaiveDate, Money>;

/// Tables that changed in one committed write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub tables: BTreeSet<TableKind>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn touches(&self, table: TableKind) -> bool {
        self.tables.contains(&table)
    }
}

/// A row removed by a (possibly cascading) delete
#[derive(Debug, Clone)]
pub struct Removed {
    pub entity: EntityRef,
    pub label: Option<String>,
    pub snapshot: serde_json::Value,
}

/// Result of [`Dataset::delete`]
#[derive(Debug, Clone, Default)]
pub struct DeleteOutcome {
    /// Every row deleted, children before parents
    pub removed: Vec<Removed>,
    /// Rows that survived with a cleared reference
    pub detached: Vec<EntityRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub accounts: Table<Account>,
    #[serde(default)]
    pub transactions: Table<Transaction>,
    #[serde(default)]
    pub bills: Table<Bill>,
    #[serde(default)]
    pub bill_overrides: Table<BillOverride>,
    #[serde(default)]
    pub bill_payments: Table<BillPayment>,
    #[serde(default)]
    pub incomes: Table<Income>,
    #[serde(default)]
    pub income_overrides: Table<IncomeOverride>,
    #[serde(default)]
    pub envelopes: Table<Envelope>,
    #[serde(default)]
    pub allocations: Table<EnvelopeAllocation>,
    #[serde(default)]
    pub envelope_transfers: Table<EnvelopeTransfer>,
    #[serde(default)]
    pub rules: Table<CategorizationRule>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- existence and references ----

    pub fn exists(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Account(id) => self.accounts.contains(id),
            EntityRef::Transaction(id) => self.transactions.contains(id),
            EntityRef::Bill(id) => self.bills.contains(id),
            EntityRef::BillOverride(id) => self.bill_overrides.contains(id),
            EntityRef::BillPayment(id) => self.bill_payments.contains(id),
            EntityRef::Income(id) => self.incomes.contains(id),
            EntityRef::IncomeOverride(id) => self.income_overrides.contains(id),
            EntityRef::Envelope(id) => self.envelopes.contains(id),
            EntityRef::Allocation(id) => self.allocations.contains(id),
            EntityRef::EnvelopeTransfer(id) => self.envelope_transfers.contains(id),
            EntityRef::Rule(id) => self.rules.contains(id),
        }
    }

    /// Fail with a referential error when `entity` is missing
    pub fn ensure_reference(&self, entity: EntityRef) -> EngineResult<()> {
        if self.exists(entity) {
            Ok(())
        } else {
            Err(EngineError::referential(entity.table().entity_name(), entity))
        }
    }

    /// Every foreign key a ledger entry carries must resolve
    pub fn check_transaction_refs(&self, txn: &Transaction) -> EngineResult<()> {
        self.ensure_reference(EntityRef::Account(txn.account_id))?;
        if let Some(dest) = txn.destination_account_id {
            self.ensure_reference(EntityRef::Account(dest))?;
        }
        if let Some(bill) = txn.bill_id {
            self.ensure_reference(EntityRef::Bill(bill))?;
        }
        if let Some(income) = txn.income_id {
            self.ensure_reference(EntityRef::Income(income))?;
        }
        if let Some(envelope) = txn.envelope_id {
            self.ensure_reference(EntityRef::Envelope(envelope))?;
        }
        Ok(())
    }

    /// Parent rows referenced by `entity` through one relation
    fn parent_of(&self, relation: Relation, entity: EntityRef) -> Option<EntityRef> {
        use EntityRef as E;
        match (relation, entity) {
            (Relation::TransactionAccount, E::Transaction(id)) => {
                self.transactions.get(id).map(|t| E::Account(t.account_id))
            }
            (Relation::TransactionDestination, E::Transaction(id)) => self
                .transactions
                .get(id)
                .and_then(|t| t.destination_account_id.map(E::Account)),
            (Relation::TransactionBill, E::Transaction(id)) => {
                self.transactions.get(id).and_then(|t| t.bill_id.map(E::Bill))
            }
            (Relation::TransactionIncome, E::Transaction(id)) => {
                self.transactions.get(id).and_then(|t| t.income_id.map(E::Income))
            }
            (Relation::TransactionEnvelope, E::Transaction(id)) => self
                .transactions
                .get(id)
                .and_then(|t| t.envelope_id.map(E::Envelope)),
            (Relation::BillAccount, E::Bill(id)) => {
                self.bills.get(id).and_then(|b| b.account_id.map(E::Account))
            }
            (Relation::BillOverrideBill, E::BillOverride(id)) => {
                self.bill_overrides.get(id).map(|o| E::Bill(o.bill_id))
            }
            (Relation::BillPaymentBill, E::BillPayment(id)) => {
                self.bill_payments.get(id).map(|p| E::Bill(p.bill_id))
            }
            (Relation::BillPaymentAccount, E::BillPayment(id)) => {
                self.bill_payments.get(id).map(|p| E::Account(p.account_id))
            }
            (Relation::BillPaymentTransaction, E::BillPayment(id)) => self
                .bill_payments
                .get(id)
                .and_then(|p| p.transaction_id.map(E::Transaction)),
            (Relation::IncomeAccount, E::Income(id)) => {
                self.incomes.get(id).and_then(|i| i.account_id.map(E::Account))
            }
            (Relation::IncomeOverrideIncome, E::IncomeOverride(id)) => {
                self.income_overrides.get(id).map(|o| E::Income(o.income_id))
            }
            (Relation::EnvelopeAccount, E::Envelope(id)) => {
                self.envelopes.get(id).and_then(|e| e.account_id.map(E::Account))
            }
            (Relation::AllocationEnvelope, E::Allocation(id)) => {
                self.allocations.get(id).map(|a| E::Envelope(a.envelope_id))
            }
            (Relation::AllocationIncome, E::Allocation(id)) => {
                self.allocations.get(id).and_then(|a| a.income_id.map(E::Income))
            }
            (Relation::TransferFromEnvelope, E::EnvelopeTransfer(id)) => self
                .envelope_transfers
                .get(id)
                .map(|t| E::Envelope(t.from_envelope_id)),
            (Relation::TransferToEnvelope, E::EnvelopeTransfer(id)) => self
                .envelope_transfers
                .get(id)
                .map(|t| E::Envelope(t.to_envelope_id)),
            (Relation::RuleEnvelope, E::Rule(id)) => {
                self.rules.get(id).map(|r| E::Envelope(r.envelope_id))
            }
            _ => None,
        }
    }

    /// All rows of the relation's child table
    fn rows_of(&self, table: TableKind) -> Vec<EntityRef> {
        fn ids<R: Record>(table: &Table<R>, wrap: fn(R::Id) -> EntityRef) -> Vec<EntityRef> {
            table.iter().map(|r| wrap(r.id())).collect()
        }
        match table {
            TableKind::Accounts => ids(&self.accounts, EntityRef::Account),
            TableKind::Transactions => ids(&self.transactions, EntityRef::Transaction),
            TableKind::Bills => ids(&self.bills, EntityRef::Bill),
            TableKind::BillOverrides => ids(&self.bill_overrides, EntityRef::BillOverride),
            TableKind::BillPayments => ids(&self.bill_payments, EntityRef::BillPayment),
            TableKind::Incomes => ids(&self.incomes, EntityRef::Income),
            TableKind::IncomeOverrides => ids(&self.income_overrides, EntityRef::IncomeOverride),
            TableKind::Envelopes => ids(&self.envelopes, EntityRef::Envelope),
            TableKind::Allocations => ids(&self.allocations, EntityRef::Allocation),
            TableKind::EnvelopeTransfers => {
                ids(&self.envelope_transfers, EntityRef::EnvelopeTransfer)
            }
            TableKind::Rules => ids(&self.rules, EntityRef::Rule),
        }
    }

    /// Rows that reference `parent` through `relation`
    pub fn children_of(&self, relation: Relation, parent: EntityRef) -> Vec<EntityRef> {
        if relation.parent() != parent.table() {
            return Vec::new();
        }
        self.rows_of(relation.child())
            .into_iter()
            .filter(|child| self.parent_of(relation, *child) == Some(parent))
            .collect()
    }

    /// Every dangling foreign key in the dataset
    pub fn dangling_references(&self) -> Vec<(Relation, EntityRef, EntityRef)> {
        let mut dangling = Vec::new();
        for relation in Relation::ALL {
            for child in self.rows_of(relation.child()) {
                if let Some(parent) = self.parent_of(relation, child) {
                    if !self.exists(parent) {
                        dangling.push((relation, child, parent));
                    }
                }
            }
        }
        dangling
    }

    fn clear_reference(&mut self, relation: Relation, child: EntityRef) {
        match (relation, child) {
            (Relation::TransactionBill, EntityRef::Transaction(id)) => {
                if let Some(t) = self.transactions.get_mut(id) {
                    t.bill_id = None;
                }
            }
            (Relation::TransactionIncome, EntityRef::Transaction(id)) => {
                if let Some(t) = self.transactions.get_mut(id) {
                    t.income_id = None;
                }
            }
            (Relation::TransactionEnvelope, EntityRef::Transaction(id)) => {
                if let Some(t) = self.transactions.get_mut(id) {
                    t.envelope_id = None;
                }
            }
            (Relation::BillAccount, EntityRef::Bill(id)) => {
                if let Some(b) = self.bills.get_mut(id) {
                    b.account_id = None;
                }
            }
            (Relation::IncomeAccount, EntityRef::Income(id)) => {
                if let Some(i) = self.incomes.get_mut(id) {
                    i.account_id = None;
                }
            }
            (Relation::EnvelopeAccount, EntityRef::Envelope(id)) => {
                if let Some(e) = self.envelopes.get_mut(id) {
                    e.account_id = None;
                }
            }
            (Relation::AllocationIncome, EntityRef::Allocation(id)) => {
                if let Some(a) = self.allocations.get_mut(id) {
                    a.income_id = None;
                }
            }
            _ => {}
        }
    }

    fn remove_row(&mut self, entity: EntityRef) -> EngineResult<Option<Removed>> {
        fn take<R: Record>(table: &mut Table<R>, id: R::Id, entity: EntityRef) -> EngineResult<Option<Removed>> {
            match table.remove(id) {
                Some(row) => Ok(Some(Removed {
                    entity,
                    label: row.label(),
                    snapshot: serde_json::to_value(&row)?,
                })),
                None => Ok(None),
            }
        }
        match entity {
            EntityRef::Account(id) => take(&mut self.accounts, id, entity),
            EntityRef::Transaction(id) => take(&mut self.transactions, id, entity),
            EntityRef::Bill(id) => take(&mut self.bills, id, entity),
            EntityRef::BillOverride(id) => take(&mut self.bill_overrides, id, entity),
            EntityRef::BillPayment(id) => take(&mut self.bill_payments, id, entity),
            EntityRef::Income(id) => take(&mut self.incomes, id, entity),
            EntityRef::IncomeOverride(id) => take(&mut self.income_overrides, id, entity),
            EntityRef::Envelope(id) => take(&mut self.envelopes, id, entity),
            EntityRef::Allocation(id) => take(&mut self.allocations, id, entity),
            EntityRef::EnvelopeTransfer(id) => take(&mut self.envelope_transfers, id, entity),
            EntityRef::Rule(id) => take(&mut self.rules, id, entity),
        }
    }

    /// Delete a row, applying every relation's deletion policy recursively,
    /// then bring the balance cache of every affected account back in line
    pub fn delete(&mut self, target: EntityRef) -> EngineResult<DeleteOutcome> {
        if !self.exists(target) {
            return Err(EngineError::not_found(target.table().entity_name(), target));
        }

        let mut outcome = DeleteOutcome::default();
        let mut touched = BTreeSet::new();
        self.delete_recursive(target, &mut outcome, &mut touched)?;

        for account in touched {
            if self.accounts.contains(account) {
                self.refresh_balance(account)?;
            }
        }
        debug!(
            target = %target,
            removed = outcome.removed.len(),
            detached = outcome.detached.len(),
            "applied delete policies"
        );
        Ok(outcome)
    }

    fn delete_recursive(
        &mut self,
        target: EntityRef,
        outcome: &mut DeleteOutcome,
        touched: &mut BTreeSet<AccountId>,
    ) -> EngineResult<()> {
        for relation in Relation::referencing(target.table()) {
            for child in self.children_of(relation, target) {
                match relation.on_delete() {
                    OnDelete::Cascade => {
                        if self.exists(child) {
                            self.delete_recursive(child, outcome, touched)?;
                        }
                    }
                    OnDelete::SetNull => {
                        self.clear_reference(relation, child);
                        outcome.detached.push(child);
                    }
                }
            }
        }

        if let EntityRef::Transaction(id) = target {
            if let Some(txn) = self.transactions.get(id) {
                touched.extend(txn.touched_accounts());
            }
        }
        if let Some(removed) = self.remove_row(target)? {
            outcome.removed.push(removed);
        }
        Ok(())
    }

    /// Mark every table modified (used after a bulk import)
    pub(crate) fn mark_all_dirty(&mut self) {
        self.accounts.mark_dirty();
        self.transactions.mark_dirty();
        self.bills.mark_dirty();
        self.bill_overrides.mark_dirty();
        self.bill_payments.mark_dirty();
        self.incomes.mark_dirty();
        self.income_overrides.mark_dirty();
        self.envelopes.mark_dirty();
        self.allocations.mark_dirty();
        self.envelope_transfers.mark_dirty();
        self.rules.mark_dirty();
    }

    /// Collect and reset the modified tables
    pub(crate) fn take_changes(&mut self) -> ChangeSet {
        let mut tables = BTreeSet::new();
        let mut note = |dirty: bool, kind: TableKind| {
            if dirty {
                tables.insert(kind);
            }
        };
        note(self.accounts.take_dirty(), TableKind::Accounts);
        note(self.transactions.take_dirty(), TableKind::Transactions);
        note(self.bills.take_dirty(), TableKind::Bills);
        note(self.bill_overrides.take_dirty(), TableKind::BillOverrides);
        note(self.bill_payments.take_dirty(), TableKind::BillPayments);
        note(self.incomes.take_dirty(), TableKind::Incomes);
        note(self.income_overrides.take_dirty(), TableKind::IncomeOverrides);
        note(self.envelopes.take_dirty(), TableKind::Envelopes);
        note(self.allocations.take_dirty(), TableKind::Allocations);
        note(self.envelope_transfers.take_dirty(), TableKind::EnvelopeTransfers);
        note(self.rules.take_dirty(), TableKind::Rules);
        ChangeSet { tables }
    }

    // ---- ledger ----

    /// Entries touching an account, as source or destination
    pub fn transactions_for_account(&self, account: AccountId) -> impl Iterator<Item = &Transaction> {
        self.transactions
            .iter()
            .filter(move |t| t.account_id == account || t.destination_account_id == Some(account))
    }

    pub fn transactions_in(&self, period: Period) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(move |t| period.contains(t.date))
    }

    /// Expenses tagged with an envelope inside a period
    pub fn envelope_expenses(&self, envelope: EnvelopeId, period: Period) -> impl Iterator<Item = &Transaction> {
        self.transactions_in(period).filter(move |t| {
            t.kind == TransactionKind::Expense && t.envelope_id == Some(envelope)
        })
    }

    /// Starting balance plus the signed effect of every entry dated on or
    /// before `as_of` (all entries when `as_of` is `None`)
    pub fn ledger_balance(&self, account: AccountId, as_of: Option<NaiveDate>) -> EngineResult<Money> {
        let starting = self.accounts.require(account)?.starting_balance;
        let effects = self
            .transactions_for_account(account)
            .filter(|t| as_of.map_or(true, |d| t.date <= d))
            .map(|t| t.effect_on(account));
        Money::try_sum(effects)
            .and_then(|total| starting.checked_add(total))
            .ok_or_else(|| EngineError::overflow(format!("balance of account {}", account)))
    }

    /// Recompute the cached current balance from the ledger
    pub fn refresh_balance(&mut self, account: AccountId) -> EngineResult<Money> {
        let computed = self.ledger_balance(account, None)?;
        if let Some(row) = self.accounts.get_mut(account) {
            if row.current_balance != computed {
                debug!(account = %account, from = %row.current_balance, to = %computed, "balance cache updated");
                row.current_balance = computed;
            }
        }
        Ok(computed)
    }

    // ---- bills and income ----

    pub fn bill_overrides_for(&self, bill: BillId) -> OverrideMap {
        self.bill_overrides
            .iter()
            .filter(|o| o.bill_id == bill)
            .map(|o| (o.date, o.amount))
            .collect()
    }

    pub fn bill_override_on(&self, bill: BillId, date: NaiveDate) -> Option<&BillOverride> {
        self.bill_overrides
            .iter()
            .find(|o| o.bill_id == bill && o.date == date)
    }

    pub fn bill_payments_for(&self, bill: BillId) -> impl Iterator<Item = &BillPayment> {
        self.bill_payments.iter().filter(move |p| p.bill_id == bill)
    }

    pub fn bill_payment_on(&self, bill: BillId, date: NaiveDate) -> Option<&BillPayment> {
        self.bill_payments_for(bill).find(|p| p.payment_date == date)
    }

    pub fn income_overrides_for(&self, income: IncomeId) -> OverrideMap {
        self.income_overrides
            .iter()
            .filter(|o| o.income_id == income)
            .map(|o| (o.date, o.amount))
            .collect()
    }

    pub fn income_override_on(&self, income: IncomeId, date: NaiveDate) -> Option<&IncomeOverride> {
        self.income_overrides
            .iter()
            .find(|o| o.income_id == income && o.date == date)
    }

    /// The income entry recorded for one occurrence, if any
    pub fn income_receipt_on(&self, income: IncomeId, date: NaiveDate) -> Option<&Transaction> {
        self.transactions.iter().find(|t| {
            t.kind == TransactionKind::Income && t.income_id == Some(income) && t.date == date
        })
    }

    // ---- envelopes ----

    /// Allocations for an envelope ordered by period start
    pub fn allocations_for(&self, envelope: EnvelopeId) -> Vec<&EnvelopeAllocation> {
        let mut rows: Vec<_> = self
            .allocations
            .iter()
            .filter(|a| a.envelope_id == envelope)
            .collect();
        rows.sort_by_key(|a| a.period.start);
        rows
    }

    pub fn allocation_starting(&self, envelope: EnvelopeId, start: NaiveDate) -> Option<&EnvelopeAllocation> {
        self.allocations
            .iter()
            .find(|a| a.envelope_id == envelope && a.period.start == start)
    }

    /// Transfers into or out of an envelope inside a period
    pub fn transfers_for(&self, envelope: EnvelopeId, period: Period) -> impl Iterator<Item = &EnvelopeTransfer> {
        self.envelope_transfers.iter().filter(move |t| {
            period.contains(t.date)
                && (t.from_envelope_id == envelope || t.to_envelope_id == envelope)
        })
    }

    /// Rules in stable order: creation time, then id
    pub fn rules_in_order(&self) -> Vec<&CategorizationRule> {
        let mut rules: Vec<_> = self.rules.iter().collect();
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        rules
    }
}
