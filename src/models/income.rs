//! Income model
//!
//! Recurring income deposited into an owning account. Income rules are open
//! ended; they stop only by being deactivated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, IncomeId, OverrideId};
use super::money::Money;
use super::recurrence::{RecurringRule, RuleValidationError};
use crate::error::EngineError;

/// A recurring income source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    pub id: IncomeId,

    pub name: String,

    #[serde(flatten)]
    pub rule: RecurringRule,

    /// Account the income lands in; cleared if that account is deleted
    #[serde(default)]
    pub account_id: Option<AccountId>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Income {
    pub fn new(name: impl Into<String>, rule: RecurringRule, account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            id: IncomeId::new(),
            name: name.into(),
            rule,
            account_id: Some(account_id),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), IncomeValidationError> {
        if self.name.trim().is_empty() {
            return Err(IncomeValidationError::EmptyName);
        }
        if self.rule.end_date.is_some() {
            return Err(IncomeValidationError::EndDateNotAllowed);
        }
        self.rule.validate().map_err(IncomeValidationError::Rule)
    }
}

impl fmt::Display for Income {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.rule.kind, self.rule.amount)
    }
}

/// Validation errors for income
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomeValidationError {
    EmptyName,
    EndDateNotAllowed,
    Rule(RuleValidationError),
}

impl fmt::Display for IncomeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Income name cannot be empty"),
            Self::EndDateNotAllowed => write!(f, "Income schedules do not take an end date"),
            Self::Rule(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for IncomeValidationError {}

impl From<IncomeValidationError> for EngineError {
    fn from(err: IncomeValidationError) -> Self {
        match err {
            IncomeValidationError::Rule(rule) => rule.into(),
            IncomeValidationError::EndDateNotAllowed => EngineError::Config(err.to_string()),
            IncomeValidationError::EmptyName => EngineError::Validation(err.to_string()),
        }
    }
}

/// Replacement amount for one income occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeOverride {
    pub id: OverrideId,
    pub income_id: IncomeId,
    pub date: NaiveDate,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl IncomeOverride {
    pub fn new(income_id: IncomeId, date: NaiveDate, amount: Money) -> Self {
        Self {
            id: OverrideId::new(),
            income_id,
            date,
            amount,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recurrence::RecurrenceKind;

    #[test]
    fn test_income_rejects_end_date() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let rule = RecurringRule::new(Money::from_units(2000), RecurrenceKind::BiWeekly, start);
        let mut income = Income::new("Salary", rule, AccountId::new());
        assert!(income.validate().is_ok());

        income.rule.end_date = Some(start);
        assert_eq!(
            income.validate(),
            Err(IncomeValidationError::EndDateNotAllowed)
        );
    }
}
