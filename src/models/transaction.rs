//! Transaction model
//!
//! A ledger entry moves value into or out of exactly one account, or for a
//! transfer, from one account to another. Amounts are always non-negative;
//! the direction comes from the kind.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, BillId, EnvelopeId, IncomeId, TransactionId};
use super::money::Money;

/// Closed set of ledger entry kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

impl TransactionKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" | "deposit" => Some(Self::Income),
            "expense" | "payment" => Some(Self::Expense),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "Income"),
            Self::Expense => write!(f, "Expense"),
            Self::Transfer => write!(f, "Transfer"),
        }
    }
}

/// A ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    /// Account the value leaves (expense, transfer) or enters (income)
    pub account_id: AccountId,

    /// Receiving account; set if and only if this is a transfer
    #[serde(default)]
    pub destination_account_id: Option<AccountId>,

    pub kind: TransactionKind,

    pub amount: Money,

    pub date: NaiveDate,

    pub recorded_at: DateTime<Utc>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub bill_id: Option<BillId>,

    #[serde(default)]
    pub income_id: Option<IncomeId>,

    /// Only meaningful on expenses
    #[serde(default)]
    pub envelope_id: Option<EnvelopeId>,
}

impl Transaction {
    pub fn new(account_id: AccountId, kind: TransactionKind, amount: Money, date: NaiveDate) -> Self {
        Self {
            id: TransactionId::new(),
            account_id,
            destination_account_id: None,
            kind,
            amount,
            date,
            recorded_at: Utc::now(),
            description: String::new(),
            bill_id: None,
            income_id: None,
            envelope_id: None,
        }
    }

    pub fn income(account_id: AccountId, amount: Money, date: NaiveDate) -> Self {
        Self::new(account_id, TransactionKind::Income, amount, date)
    }

    pub fn expense(account_id: AccountId, amount: Money, date: NaiveDate) -> Self {
        Self::new(account_id, TransactionKind::Expense, amount, date)
    }

    pub fn transfer(from: AccountId, to: AccountId, amount: Money, date: NaiveDate) -> Self {
        let mut txn = Self::new(from, TransactionKind::Transfer, amount, date);
        txn.destination_account_id = Some(to);
        txn
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_envelope(mut self, envelope_id: EnvelopeId) -> Self {
        self.envelope_id = Some(envelope_id);
        self
    }

    /// Accounts whose balance this entry changes
    pub fn touched_accounts(&self) -> impl Iterator<Item = AccountId> {
        std::iter::once(self.account_id).chain(self.destination_account_id)
    }

    /// Signed effect of this entry on the given account's balance
    pub fn effect_on(&self, account: AccountId) -> Money {
        let mut effect = Money::zero();
        if self.account_id == account {
            effect += match self.kind {
                TransactionKind::Income => self.amount,
                TransactionKind::Expense | TransactionKind::Transfer => -self.amount,
            };
        }
        if self.destination_account_id == Some(account) {
            effect += self.amount;
        }
        effect
    }

    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if self.amount.is_negative() {
            return Err(TransactionValidationError::NegativeAmount(self.amount));
        }

        match (self.kind, self.destination_account_id) {
            (TransactionKind::Transfer, None) => {
                return Err(TransactionValidationError::MissingDestination)
            }
            (TransactionKind::Transfer, Some(dest)) if dest == self.account_id => {
                return Err(TransactionValidationError::TransferToSelf)
            }
            (TransactionKind::Transfer, Some(_)) if self.amount.is_zero() => {
                return Err(TransactionValidationError::EmptyTransfer)
            }
            (TransactionKind::Income | TransactionKind::Expense, Some(_)) => {
                return Err(TransactionValidationError::UnexpectedDestination(self.kind))
            }
            _ => {}
        }

        if self.envelope_id.is_some() && self.kind != TransactionKind::Expense {
            return Err(TransactionValidationError::EnvelopeOnNonExpense(self.kind));
        }

        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.date, self.kind, self.amount)?;
        if !self.description.is_empty() {
            write!(f, " ({})", self.description)?;
        }
        Ok(())
    }
}

/// Validation errors for ledger entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    NegativeAmount(Money),
    EmptyTransfer,
    MissingDestination,
    TransferToSelf,
    UnexpectedDestination(TransactionKind),
    EnvelopeOnNonExpense(TransactionKind),
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeAmount(amount) => {
                write!(f, "Transaction amount cannot be negative: {}", amount)
            }
            Self::EmptyTransfer => write!(f, "Transfer amount must be positive"),
            Self::MissingDestination => write!(f, "Transfer requires a destination account"),
            Self::TransferToSelf => write!(f, "Cannot transfer an account to itself"),
            Self::UnexpectedDestination(kind) => {
                write!(f, "{} entries cannot have a destination account", kind)
            }
            Self::EnvelopeOnNonExpense(kind) => {
                write!(f, "{} entries cannot be tagged with an envelope", kind)
            }
        }
    }
}

impl std::error::Error for TransactionValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_signed_effects() {
        let a = AccountId::new();
        let b = AccountId::new();
        let amount = Money::from_units(50);

        assert_eq!(Transaction::income(a, amount, day(1)).effect_on(a), amount);
        assert_eq!(Transaction::expense(a, amount, day(1)).effect_on(a), -amount);
        assert_eq!(Transaction::expense(a, amount, day(1)).effect_on(b), Money::zero());

        let xfer = Transaction::transfer(a, b, amount, day(1));
        assert_eq!(xfer.effect_on(a), -amount);
        assert_eq!(xfer.effect_on(b), amount);
        assert_eq!(xfer.touched_accounts().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_destination_iff_transfer() {
        let a = AccountId::new();
        let mut txn = Transaction::expense(a, Money::from_units(5), day(2));
        txn.destination_account_id = Some(AccountId::new());
        assert_eq!(
            txn.validate(),
            Err(TransactionValidationError::UnexpectedDestination(TransactionKind::Expense))
        );

        let mut xfer = Transaction::transfer(a, AccountId::new(), Money::from_units(5), day(2));
        xfer.destination_account_id = None;
        assert_eq!(
            xfer.validate(),
            Err(TransactionValidationError::MissingDestination)
        );

        let to_self = Transaction::transfer(a, a, Money::from_units(5), day(2));
        assert_eq!(
            to_self.validate(),
            Err(TransactionValidationError::TransferToSelf)
        );
    }

    #[test]
    fn test_envelope_only_on_expense() {
        let a = AccountId::new();
        let txn = Transaction::income(a, Money::from_units(5), day(3)).with_envelope(EnvelopeId::new());
        assert_eq!(
            txn.validate(),
            Err(TransactionValidationError::EnvelopeOnNonExpense(TransactionKind::Income))
        );

        let ok = Transaction::expense(a, Money::from_units(5), day(3)).with_envelope(EnvelopeId::new());
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_amounts_must_be_non_negative() {
        let a = AccountId::new();
        let txn = Transaction::expense(a, Money::from_cents(-1), day(4));
        assert!(matches!(
            txn.validate(),
            Err(TransactionValidationError::NegativeAmount(_))
        ));

        let zero = Transaction::transfer(a, AccountId::new(), Money::zero(), day(4));
        assert_eq!(zero.validate(), Err(TransactionValidationError::EmptyTransfer));
    }
}
