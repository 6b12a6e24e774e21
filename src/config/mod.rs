//! Configuration for the cashflow engine
//!
//! - data directory resolution (`paths`)
//! - engine policies and display preferences (`settings`)

pub mod paths;
pub mod settings;

pub use paths::CashflowPaths;
pub use settings::{DuplicatePaymentPolicy, EnvelopeTransferPolicy, MatchStrategyKind, Settings};
