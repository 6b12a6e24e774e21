//! Audit trail of committed mutations
//!
//! Write transactions buffer `AuditEntry` values as they mutate rows. The
//! storage layer hands the buffer to its backend only after the transaction
//! commits, so a rolled-back write leaves no trace in the log.

mod entry;
mod logger;

pub use entry::{changed_fields, AuditEntry, Operation};
pub use logger::AuditLogger;
