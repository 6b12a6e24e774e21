//! Foreign-key topology between engine tables
//!
//! Every reference from one record to another is listed in [`Relation::ALL`]
//! together with what happens to the referencing row when the referenced
//! row is deleted. The storage layer applies these policies generically.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{
    AccountId, AllocationId, BillId, BillPaymentId, EnvelopeId, EnvelopeTransferId, IncomeId,
    OverrideId, RuleId, TransactionId,
};

/// One table per entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Accounts,
    Transactions,
    Bills,
    BillOverrides,
    BillPayments,
    Incomes,
    IncomeOverrides,
    Envelopes,
    Allocations,
    EnvelopeTransfers,
    Rules,
}

impl TableKind {
    /// Singular entity name used in error messages
    pub fn entity_name(self) -> &'static str {
        match self {
            Self::Accounts => "Account",
            Self::Transactions => "Transaction",
            Self::Bills => "Bill",
            Self::BillOverrides => "Bill override",
            Self::BillPayments => "Bill payment",
            Self::Incomes => "Income",
            Self::IncomeOverrides => "Income override",
            Self::Envelopes => "Envelope",
            Self::Allocations => "Envelope allocation",
            Self::EnvelopeTransfers => "Envelope transfer",
            Self::Rules => "Categorization rule",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_name())
    }
}

/// A typed reference to a single row in any table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Account(AccountId),
    Transaction(TransactionId),
    Bill(BillId),
    BillOverride(OverrideId),
    BillPayment(BillPaymentId),
    Income(IncomeId),
    IncomeOverride(OverrideId),
    Envelope(EnvelopeId),
    Allocation(AllocationId),
    EnvelopeTransfer(EnvelopeTransferId),
    Rule(RuleId),
}

impl EntityRef {
    pub fn table(&self) -> TableKind {
        match self {
            Self::Account(_) => TableKind::Accounts,
            Self::Transaction(_) => TableKind::Transactions,
            Self::Bill(_) => TableKind::Bills,
            Self::BillOverride(_) => TableKind::BillOverrides,
            Self::BillPayment(_) => TableKind::BillPayments,
            Self::Income(_) => TableKind::Incomes,
            Self::IncomeOverride(_) => TableKind::IncomeOverrides,
            Self::Envelope(_) => TableKind::Envelopes,
            Self::Allocation(_) => TableKind::Allocations,
            Self::EnvelopeTransfer(_) => TableKind::EnvelopeTransfers,
            Self::Rule(_) => TableKind::Rules,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(id) => write!(f, "{}", id),
            Self::Transaction(id) => write!(f, "{}", id),
            Self::Bill(id) => write!(f, "{}", id),
            Self::BillOverride(id) | Self::IncomeOverride(id) => write!(f, "{}", id),
            Self::BillPayment(id) => write!(f, "{}", id),
            Self::Income(id) => write!(f, "{}", id),
            Self::Envelope(id) => write!(f, "{}", id),
            Self::Allocation(id) => write!(f, "{}", id),
            Self::EnvelopeTransfer(id) => write!(f, "{}", id),
            Self::Rule(id) => write!(f, "{}", id),
        }
    }
}

/// What happens to a referencing row when its parent is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Delete the referencing row too
    Cascade,
    /// Keep the row, clear the reference
    SetNull,
}

/// Every foreign key in the data model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    TransactionAccount,
    TransactionDestination,
    TransactionBill,
    TransactionIncome,
    TransactionEnvelope,
    BillAccount,
    BillOverrideBill,
    BillPaymentBill,
    BillPaymentAccount,
    BillPaymentTransaction,
    IncomeAccount,
    IncomeOverrideIncome,
    EnvelopeAccount,
    AllocationEnvelope,
    AllocationIncome,
    TransferFromEnvelope,
    TransferToEnvelope,
    RuleEnvelope,
}

impl Relation {
    pub const ALL: [Relation; 18] = [
        Self::TransactionAccount,
        Self::TransactionDestination,
        Self::TransactionBill,
        Self::TransactionIncome,
        Self::TransactionEnvelope,
        Self::BillAccount,
        Self::BillOverrideBill,
        Self::BillPaymentBill,
        Self::BillPaymentAccount,
        Self::BillPaymentTransaction,
        Self::IncomeAccount,
        Self::IncomeOverrideIncome,
        Self::EnvelopeAccount,
        Self::AllocationEnvelope,
        Self::AllocationIncome,
        Self::TransferFromEnvelope,
        Self::TransferToEnvelope,
        Self::RuleEnvelope,
    ];

    /// `(child table, parent table, policy)`
    pub const fn edge(self) -> (TableKind, TableKind, OnDelete) {
        use OnDelete::*;
        use TableKind::*;
        match self {
            Self::TransactionAccount => (Transactions, Accounts, Cascade),
            Self::TransactionDestination => (Transactions, Accounts, Cascade),
            Self::TransactionBill => (Transactions, Bills, SetNull),
            Self::TransactionIncome => (Transactions, Incomes, SetNull),
            Self::TransactionEnvelope => (Transactions, Envelopes, SetNull),
            Self::BillAccount => (Bills, Accounts, SetNull),
            Self::BillOverrideBill => (BillOverrides, Bills, Cascade),
            Self::BillPaymentBill => (BillPayments, Bills, Cascade),
            Self::BillPaymentAccount => (BillPayments, Accounts, Cascade),
            Self::BillPaymentTransaction => (BillPayments, Transactions, Cascade),
            Self::IncomeAccount => (Incomes, Accounts, SetNull),
            Self::IncomeOverrideIncome => (IncomeOverrides, Incomes, Cascade),
            Self::EnvelopeAccount => (Envelopes, Accounts, SetNull),
            Self::AllocationEnvelope => (Allocations, Envelopes, Cascade),
            Self::AllocationIncome => (Allocations, Incomes, SetNull),
            Self::TransferFromEnvelope => (EnvelopeTransfers, Envelopes, Cascade),
            Self::TransferToEnvelope => (EnvelopeTransfers, Envelopes, Cascade),
            Self::RuleEnvelope => (Rules, Envelopes, Cascade),
        }
    }

    pub fn child(self) -> TableKind {
        self.edge().0
    }

    pub fn parent(self) -> TableKind {
        self.edge().1
    }

    pub fn on_delete(self) -> OnDelete {
        self.edge().2
    }

    /// Relations whose parent is the given table
    pub fn referencing(parent: TableKind) -> impl Iterator<Item = Relation> {
        Self::ALL.into_iter().filter(move |r| r.parent() == parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_children_cascade() {
        assert_eq!(Relation::BillOverrideBill.on_delete(), OnDelete::Cascade);
        assert_eq!(Relation::BillPaymentBill.on_delete(), OnDelete::Cascade);
        assert_eq!(Relation::AllocationEnvelope.on_delete(), OnDelete::Cascade);
        assert_eq!(Relation::TransactionAccount.on_delete(), OnDelete::Cascade);
    }

    #[test]
    fn test_loose_references_set_null() {
        assert_eq!(Relation::BillAccount.on_delete(), OnDelete::SetNull);
        assert_eq!(Relation::EnvelopeAccount.on_delete(), OnDelete::SetNull);
        assert_eq!(Relation::IncomeAccount.on_delete(), OnDelete::SetNull);
        assert_eq!(Relation::AllocationIncome.on_delete(), OnDelete::SetNull);
    }

    #[test]
    fn test_referencing_accounts() {
        let children: Vec<_> = Relation::referencing(TableKind::Accounts)
            .map(Relation::child)
            .collect();
        assert_eq!(
            children,
            vec![
                TableKind::Transactions,
                TableKind::Transactions,
                TableKind::Bills,
                TableKind::BillPayments,
                TableKind::Incomes,
                TableKind::Envelopes,
            ]
        );
    }

    #[test]
    fn test_every_relation_points_between_distinct_tables() {
        for relation in Relation::ALL {
            assert_ne!(relation.child(), relation.parent(), "{:?}", relation);
        }
    }
}
