//! Typed in-memory tables
//!
//! A [`Table`] is an ordered map keyed by the record's id that remembers
//! whether it was modified since the last commit. Tables serialize as plain
//! JSON arrays.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::dataset::Dataset;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Account, AccountId, AllocationId, Bill, BillId, BillOverride, BillPayment, BillPaymentId,
    CategorizationRule, Envelope, EnvelopeAllocation, EnvelopeId, EnvelopeTransfer,
    EnvelopeTransferId, Income, IncomeId, IncomeOverride, OverrideId, RuleId, TableKind,
    Transaction, TransactionId,
};

/// A row type stored in one [`Dataset`] table
pub trait Record: fmt::Debug + Clone + Serialize + DeserializeOwned {
    type Id: Copy + Ord + fmt::Debug + fmt::Display;

    const TABLE: TableKind;

    fn id(&self) -> Self::Id;

    /// Human-readable name for audit entries
    fn label(&self) -> Option<String> {
        None
    }

    fn table(data: &Dataset) -> &Table<Self>;

    fn table_mut(data: &mut Dataset) -> &mut Table<Self>;
}

#[derive(Debug, Clone)]
pub struct Table<R: Record> {
    rows: BTreeMap<R::Id, R>,
    dirty: bool,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            dirty: false,
        }
    }
}

impl<R: Record> Table<R> {
    pub fn get(&self, id: R::Id) -> Option<&R> {
        self.rows.get(&id)
    }

    /// Get a row or fail with a "not found" error
    pub fn require(&self, id: R::Id) -> EngineResult<&R> {
        self.rows
            .get(&id)
            .ok_or_else(|| EngineError::not_found(R::TABLE.entity_name(), id))
    }

    pub fn contains(&self, id: R::Id) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert a new row, rejecting an id that is already present
    pub fn insert(&mut self, row: R) -> EngineResult<()> {
        let id = row.id();
        if self.rows.contains_key(&id) {
            return Err(EngineError::duplicate(R::TABLE.entity_name(), id));
        }
        self.rows.insert(id, row);
        self.dirty = true;
        Ok(())
    }

    /// Replace an existing row, returning the previous version
    pub fn replace(&mut self, row: R) -> EngineResult<R> {
        let id = row.id();
        match self.rows.get_mut(&id) {
            Some(slot) => {
                self.dirty = true;
                Ok(std::mem::replace(slot, row))
            }
            None => Err(EngineError::not_found(R::TABLE.entity_name(), id)),
        }
    }

    pub fn get_mut(&mut self, id: R::Id) -> Option<&mut R> {
        let row = self.rows.get_mut(&id);
        if row.is_some() {
            self.dirty = true;
        }
        row
    }

    pub fn remove(&mut self, id: R::Id) -> Option<R> {
        let removed = self.rows.remove(&id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Report and reset the modified flag
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

impl<R: Record> Serialize for Table<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows.values())
    }
}

impl<'de, R: Record> Deserialize<'de> for Table<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<R>::deserialize(deserializer)?;
        Ok(Self {
            rows: rows.into_iter().map(|r| (r.id(), r)).collect(),
            dirty: false,
        })
    }
}

macro_rules! impl_record {
    ($ty:ty, $id:ty, $table:ident, $field:ident $(, |$row:ident| $label:expr)?) => {
        impl Record for $ty {
            type Id = $id;

            const TABLE: TableKind = TableKind::$table;

            fn id(&self) -> Self::Id {
                self.id
            }

            $(
                fn label(&self) -> Option<String> {
                    let $row = self;
                    Some($label)
                }
            )?

            fn table(data: &Dataset) -> &Table<Self> {
                &data.$field
            }

            fn table_mut(data: &mut Dataset) -> &mut Table<Self> {
                &mut data.$field
            }
        }
    };
}

impl_record!(Account, AccountId, Accounts, accounts, |a| a.name.clone());
impl_record!(Transaction, TransactionId, Transactions, transactions, |t| t.to_string());
impl_record!(Bill, BillId, Bills, bills, |b| b.name.clone());
impl_record!(BillOverride, OverrideId, BillOverrides, bill_overrides);
impl_record!(BillPayment, BillPaymentId, BillPayments, bill_payments);
impl_record!(Income, IncomeId, Incomes, incomes, |i| i.name.clone());
impl_record!(IncomeOverride, OverrideId, IncomeOverrides, income_overrides);
impl_record!(Envelope, EnvelopeId, Envelopes, envelopes, |e| e.name.clone());
impl_record!(EnvelopeAllocation, AllocationId, Allocations, allocations);
impl_record!(EnvelopeTransfer, EnvelopeTransferId, EnvelopeTransfers, envelope_transfers);
impl_record!(CategorizationRule, RuleId, Rules, rules, |r| r.keyword.clone());

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountKind, Money};

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut table: Table<Account> = Table::default();
        let account = Account::new("Checking", AccountKind::Checking, Money::zero());
        table.insert(account.clone()).unwrap();
        let err = table.insert(account).unwrap_err();
        assert!(matches!(err, EngineError::Duplicate { .. }));
    }

    #[test]
    fn test_dirty_flag_tracks_mutation() {
        let mut table: Table<Account> = Table::default();
        assert!(!table.take_dirty());

        let account = Account::new("Cash", AccountKind::Cash, Money::zero());
        let id = account.id;
        table.insert(account).unwrap();
        assert!(table.take_dirty());
        assert!(!table.take_dirty());

        assert!(table.remove(AccountId::new()).is_none());
        assert!(!table.take_dirty());

        table.remove(id);
        assert!(table.take_dirty());
    }

    #[test]
    fn test_replace_requires_existing_row() {
        let mut table: Table<Account> = Table::default();
        let account = Account::new("Savings", AccountKind::Savings, Money::zero());
        let err = table.replace(account.clone()).unwrap_err();
        assert!(err.is_not_found());

        table.insert(account.clone()).unwrap();
        let mut renamed = account.clone();
        renamed.name = "Rainy day".into();
        let previous = table.replace(renamed).unwrap();
        assert_eq!(previous.name, "Savings");
        assert_eq!(table.require(account.id).unwrap().name, "Rainy day");
    }

    #[test]
    fn test_serializes_as_array() {
        let mut table: Table<Account> = Table::default();
        table
            .insert(Account::new("Checking", AccountKind::Checking, Money::zero()))
            .unwrap();
        let json = serde_json::to_value(&table).unwrap();
        assert!(json.is_array());

        let back: Table<Account> = serde_json::from_value(json).unwrap();
        assert_eq!(back.len(), 1);
    }
}
