//! Cashflow engine - recurring bills and income, an account ledger and
//! envelope budgeting
//!
//! The engine expands recurring rules into dated occurrences, keeps a ledger
//! of income, expense and transfer entries with cached account balances,
//! tracks which bill and income occurrences have been settled, and runs an
//! envelope allocator whose periods come from the same recurrence math.
//!
//! # Architecture
//!
//! - `config`: data directory resolution and engine policies
//! - `error`: the engine error type
//! - `models`: accounts, ledger entries, bills, income, envelopes, rules
//! - `storage`: transactional store over a pluggable backend
//! - `services`: business logic on top of storage
//! - `audit`: append-only audit log of every committed change
//! - `display`: plain-text formatting for the CLI
//! - `cli`: clap command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use cashflow_engine::services::AccountService;
//! use cashflow_engine::storage::Storage;
//!
//! let storage = Storage::in_memory();
//! let accounts = AccountService::new(&storage);
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{EngineError, EngineResult, ErrorKind};
