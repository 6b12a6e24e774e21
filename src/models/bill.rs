//! Bill model
//!
//! A bill is a recurring rule plus an optional paying account and a reminder
//! lead time. Bills own their date overrides and their payments.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, BillId, BillPaymentId, OverrideId, TransactionId};
use super::money::Money;
use super::recurrence::{RecurringRule, RuleValidationError};
use crate::error::EngineError;

fn default_reminder_days() -> u32 {
    3
}

/// A recurring bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,

    pub name: String,

    #[serde(flatten)]
    pub rule: RecurringRule,

    /// Account a payment is drawn from when none is given
    #[serde(default)]
    pub account_id: Option<AccountId>,

    /// How many days before the due date a reminder becomes due
    #[serde(default = "default_reminder_days")]
    pub reminder_days_before: u32,

    #[serde(default)]
    pub notes: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Bill {
    pub fn new(name: impl Into<String>, rule: RecurringRule) -> Self {
        let now = Utc::now();
        Self {
            id: BillId::new(),
            name: name.into(),
            rule,
            account_id: None,
            reminder_days_before: default_reminder_days(),
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn validate(&self) -> Result<(), BillValidationError> {
        if self.name.trim().is_empty() {
            return Err(BillValidationError::EmptyName);
        }
        self.rule.validate().map_err(BillValidationError::Rule)
    }
}

impl fmt::Display for Bill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.rule.kind, self.rule.amount)
    }
}

/// Validation errors for bills
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillValidationError {
    EmptyName,
    Rule(RuleValidationError),
}

impl fmt::Display for BillValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Bill name cannot be empty"),
            Self::Rule(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for BillValidationError {}

impl From<BillValidationError> for EngineError {
    fn from(err: BillValidationError) -> Self {
        match err {
            BillValidationError::Rule(rule) => rule.into(),
            other => EngineError::Validation(other.to_string()),
        }
    }
}

/// Replacement amount for one bill occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillOverride {
    pub id: OverrideId,
    pub bill_id: BillId,
    pub date: NaiveDate,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl BillOverride {
    pub fn new(bill_id: BillId, date: NaiveDate, amount: Money) -> Self {
        Self {
            id: OverrideId::new(),
            bill_id,
            date,
            amount,
            created_at: Utc::now(),
        }
    }
}

/// A confirmed bill occurrence
///
/// At most one payment exists per `(bill_id, payment_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillPayment {
    pub id: BillPaymentId,
    pub bill_id: BillId,
    pub account_id: AccountId,
    pub payment_date: NaiveDate,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub transaction_id: Option<TransactionId>,
}

impl BillPayment {
    pub fn new(bill_id: BillId, account_id: AccountId, payment_date: NaiveDate, amount: Money) -> Self {
        Self {
            id: BillPaymentId::new(),
            bill_id,
            account_id,
            payment_date,
            amount,
            recorded_at: Utc::now(),
            transaction_id: None,
        }
    }
}
