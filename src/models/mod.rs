//! Core data models for the cashflow engine
//!
//! Accounts, the transaction ledger, recurring bills and income with their
//! overrides and payments, envelopes with allocations and transfers, and the
//! keyword rules used to suggest envelopes.

pub mod account;
pub mod bill;
pub mod envelope;
pub mod ids;
pub mod income;
pub mod money;
pub mod period;
pub mod recurrence;
pub mod relations;
pub mod rule;
pub mod transaction;

pub use account::{Account, AccountKind};
pub use bill::{Bill, BillOverride, BillPayment};
pub use envelope::{Envelope, EnvelopeAllocation, EnvelopeTransfer};
pub use ids::{
    AccountId, AllocationId, BillId, BillPaymentId, EnvelopeId, EnvelopeTransferId, IncomeId,
    OverrideId, RuleId, TransactionId,
};
pub use income::{Income, IncomeOverride};
pub use money::Money;
pub use period::Period;
pub use recurrence::{RecurrenceKind, RecurringRule};
pub use relations::{EntityRef, OnDelete, Relation, TableKind};
pub use rule::CategorizationRule;
pub use transaction::{Transaction, TransactionKind};
