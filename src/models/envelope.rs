//! Envelope models
//!
//! An envelope is a named budget bucket funded once per period. Allocations
//! pin the funded amount for one concrete period; transfers move spending
//! capacity between two envelopes without touching any account.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, AllocationId, EnvelopeId, EnvelopeTransferId, IncomeId};
use super::money::Money;
use super::period::Period;
use super::recurrence::RecurrenceKind;
use crate::error::EngineError;

/// A budget envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: EnvelopeId,

    pub name: String,

    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub icon: Option<String>,

    /// Amount funded each period when no explicit allocation exists
    pub budgeted_amount: Money,

    /// Length of one budgeting period; never one-time
    pub period_kind: RecurrenceKind,

    /// First day of the first period
    pub anchor_date: NaiveDate,

    #[serde(default)]
    pub account_id: Option<AccountId>,

    /// Carry a positive remainder into the next period
    #[serde(default)]
    pub carry_over: bool,

    pub active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Envelope {
    /// Create an envelope whose periods are anchored on today's date
    pub fn new(name: impl Into<String>, budgeted_amount: Money, period_kind: RecurrenceKind) -> Self {
        let now = Utc::now();
        Self {
            id: EnvelopeId::new(),
            name: name.into(),
            color: None,
            icon: None,
            budgeted_amount,
            period_kind,
            anchor_date: now.date_naive(),
            account_id: None,
            carry_over: false,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn anchored_at(mut self, anchor_date: NaiveDate) -> Self {
        self.anchor_date = anchor_date;
        self
    }

    pub fn with_carry_over(mut self, carry_over: bool) -> Self {
        self.carry_over = carry_over;
        self
    }

    pub fn validate(&self) -> Result<(), EnvelopeValidationError> {
        if self.name.trim().is_empty() {
            return Err(EnvelopeValidationError::EmptyName);
        }
        if !self.period_kind.is_periodic() {
            return Err(EnvelopeValidationError::NonPeriodicKind(self.period_kind));
        }
        if self.budgeted_amount.is_negative() {
            return Err(EnvelopeValidationError::NegativeBudget(self.budgeted_amount));
        }
        Ok(())
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} / {})", self.name, self.budgeted_amount, self.period_kind)
    }
}

/// Validation errors for envelopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeValidationError {
    EmptyName,
    NonPeriodicKind(RecurrenceKind),
    NegativeBudget(Money),
}

impl fmt::Display for EnvelopeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Envelope name cannot be empty"),
            Self::NonPeriodicKind(kind) => {
                write!(f, "{} is not a valid envelope period", kind)
            }
            Self::NegativeBudget(amount) => {
                write!(f, "Budgeted amount cannot be negative: {}", amount)
            }
        }
    }
}

impl std::error::Error for EnvelopeValidationError {}

impl From<EnvelopeValidationError> for EngineError {
    fn from(err: EnvelopeValidationError) -> Self {
        match err {
            EnvelopeValidationError::NonPeriodicKind(_) => EngineError::Config(err.to_string()),
            _ => EngineError::Validation(err.to_string()),
        }
    }
}

/// Funded amount for one concrete envelope period
///
/// Unique per `(envelope_id, period.start)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeAllocation {
    pub id: AllocationId,
    pub envelope_id: EnvelopeId,
    pub amount: Money,
    pub period: Period,
    #[serde(default)]
    pub income_id: Option<IncomeId>,
    pub created_at: DateTime<Utc>,
}

impl EnvelopeAllocation {
    pub fn new(envelope_id: EnvelopeId, period: Period, amount: Money) -> Self {
        Self {
            id: AllocationId::new(),
            envelope_id,
            amount,
            period,
            income_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Capacity moved from one envelope to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeTransfer {
    pub id: EnvelopeTransferId,
    pub from_envelope_id: EnvelopeId,
    pub to_envelope_id: EnvelopeId,
    pub amount: Money,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EnvelopeTransfer {
    pub fn new(from: EnvelopeId, to: EnvelopeId, amount: Money, date: NaiveDate) -> Self {
        Self {
            id: EnvelopeTransferId::new(),
            from_envelope_id: from,
            to_envelope_id: to,
            amount,
            date,
            description: None,
            created_at: Utc::now(),
        }
    }

    /// Signed change this transfer makes to an envelope's consumption
    pub fn consumption_delta(&self, envelope: EnvelopeId) -> Money {
        if self.from_envelope_id == envelope {
            self.amount
        } else if self.to_envelope_id == envelope {
            -self.amount
        } else {
            Money::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_time_is_not_a_period() {
        let envelope = Envelope::new("Groceries", Money::from_units(300), RecurrenceKind::OneTime);
        assert_eq!(
            envelope.validate(),
            Err(EnvelopeValidationError::NonPeriodicKind(RecurrenceKind::OneTime))
        );
    }

    #[test]
    fn test_transfer_moves_consumption() {
        let from = EnvelopeId::new();
        let to = EnvelopeId::new();
        let date = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let transfer = EnvelopeTransfer::new(from, to, Money::from_units(50), date);

        assert_eq!(transfer.consumption_delta(from), Money::from_units(50));
        assert_eq!(transfer.consumption_delta(to), Money::from_units(-50));
        assert_eq!(transfer.consumption_delta(EnvelopeId::new()), Money::zero());
    }
}
