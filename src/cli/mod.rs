//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod account;
pub mod bill;
pub mod envelope;
pub mod export;
pub mod income;
pub mod report;
pub mod rule;
pub mod transaction;

pub use account::{handle_account_command, AccountCommands};
pub use bill::{handle_bill_command, BillCommands};
pub use envelope::{handle_envelope_command, EnvelopeCommands};
pub use export::{handle_export_command, handle_import_command};
pub use income::{handle_income_command, IncomeCommands};
pub use report::{handle_agenda_command, handle_flow_command, handle_verify_command};
pub use rule::{handle_rule_command, RuleCommands};
pub use transaction::{handle_transaction_command, TransactionCommands};

use chrono::{Duration, NaiveDate};

use crate::config::Settings;
use crate::display::Style;
use crate::error::{EngineError, EngineResult};
use crate::models::{Account, Bill, Envelope, Income, Money, Period};
use crate::services::{
    AccountService, BillService, CashFlowService, EnvelopeService, IncomeService, RuleService,
};
use crate::storage::Storage;

/// Everything a command handler needs
pub struct CliContext<'a> {
    pub storage: &'a Storage,
    pub settings: &'a Settings,
    /// Reference date for due/overdue classification and defaults
    pub today: NaiveDate,
}

impl<'a> CliContext<'a> {
    pub fn new(storage: &'a Storage, settings: &'a Settings, today: NaiveDate) -> Self {
        Self {
            storage,
            settings,
            today,
        }
    }

    pub fn style(&self) -> Style<'a> {
        Style::from_settings(self.settings)
    }

    pub fn bills(&self) -> BillService<'a> {
        BillService::new(self.storage).with_duplicate_policy(self.settings.duplicate_payment)
    }

    pub fn incomes(&self) -> IncomeService<'a> {
        IncomeService::new(self.storage).with_duplicate_policy(self.settings.duplicate_payment)
    }

    pub fn envelopes(&self) -> EnvelopeService<'a> {
        EnvelopeService::new(self.storage).with_transfer_policy(self.settings.envelope_transfer)
    }

    pub fn rules(&self) -> RuleService<'a> {
        RuleService::new(self.storage).with_strategy(self.settings.match_strategy)
    }

    pub fn cashflow(&self) -> CashFlowService<'a> {
        CashFlowService::new(self.storage).with_warning_threshold(self.settings.low_balance_warning)
    }

    /// Parse an optional date argument, defaulting to today
    pub fn date_or_today(&self, date: Option<&str>) -> EngineResult<NaiveDate> {
        date.map(parse_date).transpose().map(|d| d.unwrap_or(self.today))
    }

    /// A window of `days` days starting at `from` (or today)
    pub fn window(&self, from: Option<&str>, days: u32) -> EngineResult<Period> {
        if days == 0 {
            return Err(EngineError::Validation("Window must be at least one day".into()));
        }
        let start = self.date_or_today(from)?;
        Period::new(start, start + Duration::days(i64::from(days) - 1))
    }

    pub fn require_account(&self, identifier: &str) -> EngineResult<Account> {
        AccountService::new(self.storage)
            .find(identifier)?
            .ok_or_else(|| EngineError::account_not_found(identifier))
    }

    pub fn require_bill(&self, identifier: &str) -> EngineResult<Bill> {
        self.bills()
            .find(identifier)?
            .ok_or_else(|| EngineError::not_found("Bill", identifier))
    }

    pub fn require_income(&self, identifier: &str) -> EngineResult<Income> {
        self.incomes()
            .find(identifier)?
            .ok_or_else(|| EngineError::not_found("Income", identifier))
    }

    pub fn require_envelope(&self, identifier: &str) -> EngineResult<Envelope> {
        self.envelopes()
            .find(identifier)?
            .ok_or_else(|| EngineError::not_found("Envelope", identifier))
    }
}

/// Parse a YYYY-MM-DD date
pub fn parse_date(s: &str) -> EngineResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        EngineError::Validation(format!("Invalid date: '{}'. Use YYYY-MM-DD.", s))
    })
}

/// Parse a decimal amount like "12.50"
pub fn parse_money(s: &str) -> EngineResult<Money> {
    Money::parse(s).map_err(|e| {
        EngineError::Validation(format!(
            "Invalid amount: '{}'. Use format like '1000.00' or '1000'. Error: {}",
            s, e
        ))
    })
}

/// Whether `identifier` names an id, by its short display form or full UUID
pub(crate) fn matches_id(display: &str, uuid: &uuid::Uuid, identifier: &str) -> bool {
    let identifier = identifier.trim();
    display.eq_ignore_ascii_case(identifier) || uuid.to_string().eq_ignore_ascii_case(identifier)
}
