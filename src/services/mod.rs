//! Service layer for the cashflow engine
//!
//! Services put business rules on top of the storage layer: validation,
//! computed views, and cross-entity operations that must commit together.
//! Pure computations (expansion, period derivation, envelope status,
//! categorization, projection) are exposed as free functions over a
//! dataset snapshot so they can be tested without storage.

pub mod account;
pub mod bill;
pub mod cashflow;
pub mod categorizer;
pub mod envelope;
pub mod expander;
pub mod income;
pub mod ledger;
pub mod schedule;

pub use account::{AccountService, AccountSummary};
pub use bill::{BillService, PaymentOptions, Reminder};
pub use cashflow::{CashFlowDay, CashFlowEvent, CashFlowEventKind, CashFlowProjection, CashFlowService};
pub use categorizer::{suggest, strategy_for, CaseInsensitive, MatchStrategy, RuleService, Substring};
pub use envelope::{EnvelopeService, EnvelopeSpending, EnvelopeStatus};
pub use expander::{occurrences_in_range, Occurrence};
pub use income::IncomeService;
pub use ledger::LedgerService;
pub use schedule::{AgendaItem, OccurrenceStatus, ScheduleService, ScheduleSource, ScheduledOccurrence};
