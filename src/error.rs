//! Error types for the cashflow engine
//!
//! Every engine operation returns [`EngineResult`]. Each variant carries
//! enough structure (kind plus the offending entity ids) for a caller to
//! render a meaningful message without parsing strings.

use thiserror::Error;

use crate::models::Money;

/// The main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid recurrence kind, invalid date range or similar misconfiguration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A record references a parent that does not exist
    #[error("{entity_type} referenced but missing: {identifier}")]
    Referential {
        entity_type: &'static str,
        identifier: String,
    },

    /// An operation addressed a record that does not exist
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Uniqueness violation (override date, allocation period, repeat payment)
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// The cached account balance disagrees with the ledger
    #[error("Balance cache for account {account} is {cached} but the ledger says {computed}")]
    Consistency {
        account: String,
        cached: Money,
        computed: Money,
    },

    /// Amount or shape violations on user input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistence layer failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),
}

/// Flat classification of [`EngineError`] for callers that only branch on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Referential,
    NotFound,
    Duplicate,
    Consistency,
    Validation,
    Storage,
}

impl EngineError {
    /// Create a "not found" error for accounts
    pub fn account_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Account",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for an arbitrary entity
    pub fn not_found(entity_type: &'static str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            identifier: identifier.to_string(),
        }
    }

    /// Create a dangling-reference error
    pub fn referential(entity_type: &'static str, identifier: impl ToString) -> Self {
        Self::Referential {
            entity_type,
            identifier: identifier.to_string(),
        }
    }

    /// Create a uniqueness error
    pub fn duplicate(entity_type: &'static str, identifier: impl ToString) -> Self {
        Self::Duplicate {
            entity_type,
            identifier: identifier.to_string(),
        }
    }

    /// Create a validation error for a sum that left the representable range
    pub fn overflow(context: impl std::fmt::Display) -> Self {
        Self::Validation(format!("Amount overflow in {}", context))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Referential { .. } => ErrorKind::Referential,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::Consistency { .. } => ErrorKind::Consistency,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Storage,
        }
    }

    /// The offending entity, when the error names one
    pub fn entity(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::Referential {
                entity_type,
                identifier,
            }
            | Self::NotFound {
                entity_type,
                identifier,
            }
            | Self::Duplicate {
                entity_type,
                identifier,
            } => Some((entity_type, identifier.as_str())),
            Self::Consistency { account, .. } => Some(("Account", account.as_str())),
            _ => None,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
