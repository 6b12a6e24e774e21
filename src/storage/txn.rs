//! Write transactions
//!
//! A `WriteTxn` wraps the private working copy of a write. Reads go through
//! `Deref<Target = Dataset>`; every mutation goes through a method here so it
//! is recorded in the audit buffer.

use std::ops::Deref;

use tracing::debug;

use super::dataset::{Dataset, DeleteOutcome};
use super::table::Record;
use crate::audit::AuditEntry;
use crate::error::EngineResult;
use crate::models::{AccountId, EntityRef, Money};

pub struct WriteTxn<'a> {
    data: &'a mut Dataset,
    audit: Vec<AuditEntry>,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn new(data: &'a mut Dataset) -> Self {
        Self {
            data,
            audit: Vec::new(),
        }
    }

    /// Insert a new row
    pub fn insert<R: Record>(&mut self, row: R) -> EngineResult<R::Id> {
        let id = row.id();
        let label = row.label();
        let snapshot = serde_json::to_value(&row)?;
        R::table_mut(self.data).insert(row)?;
        self.audit
            .push(AuditEntry::create(R::TABLE, id.to_string(), label, snapshot));
        Ok(id)
    }

    /// Replace an existing row, returning the previous version
    pub fn update<R: Record>(&mut self, row: R) -> EngineResult<R> {
        let id = row.id();
        let label = row.label();
        let after = serde_json::to_value(&row)?;
        let previous = R::table_mut(self.data).replace(row)?;
        let before = serde_json::to_value(&previous)?;
        self.audit
            .push(AuditEntry::update(R::TABLE, id.to_string(), label, before, after));
        Ok(previous)
    }

    /// Apply `change` to a copy of the row and store it
    pub fn modify<R: Record>(&mut self, id: R::Id, change: impl FnOnce(&mut R)) -> EngineResult<R> {
        let mut row = R::table(self.data).require(id)?.clone();
        change(&mut row);
        self.update(row.clone())?;
        Ok(row)
    }

    /// Delete a row and everything its deletion policies reach
    pub fn delete(&mut self, target: EntityRef) -> EngineResult<DeleteOutcome> {
        let outcome = self.data.delete(target)?;
        for removed in &outcome.removed {
            self.audit.push(AuditEntry::delete(
                removed.entity.table(),
                removed.entity.to_string(),
                removed.label.clone(),
                removed.snapshot.clone(),
            ));
        }
        if !outcome.detached.is_empty() {
            debug!(detached = ?outcome.detached, "references cleared by delete");
        }
        Ok(outcome)
    }

    /// Recompute an account's cached balance from the ledger
    pub fn refresh_balance(&mut self, account: AccountId) -> EngineResult<Money> {
        self.data.refresh_balance(account)
    }

    /// Swap in a whole dataset (bulk import)
    pub(crate) fn replace_all(&mut self, data: Dataset) {
        *self.data = data;
        self.data.mark_all_dirty();
    }

    pub(crate) fn into_audit(self) -> Vec<AuditEntry> {
        self.audit
    }

    /// Entries buffered so far
    pub fn pending_audit(&self) -> &[AuditEntry] {
        &self.audit
    }
}

impl Deref for WriteTxn<'_> {
    type Target = Dataset;

    fn deref(&self) -> &Dataset {
        self.data
    }
}
