//! Display formatting for terminal output
//!
//! Plain-text tables for the CLI. Every formatter returns a `String`; the
//! caller decides where it goes.

pub mod account;
pub mod cashflow;
pub mod envelope;
pub mod schedule;

pub use account::{format_account_list, format_entry_list};
pub use cashflow::format_projection;
pub use envelope::{format_envelope_history, format_envelope_overview, format_envelope_status, format_spending};
pub use schedule::{format_agenda, format_bill_list, format_income_list, format_occurrences, format_reminders};

use std::fmt::Write;

use chrono::NaiveDate;

use crate::config::Settings;
use crate::models::Money;

/// Currency and date presentation taken from settings
#[derive(Debug, Clone, Copy)]
pub struct Style<'a> {
    pub currency: &'a str,
    pub date_format: &'a str,
}

impl<'a> Style<'a> {
    pub fn from_settings(settings: &'a Settings) -> Self {
        Self {
            currency: &settings.currency_symbol,
            date_format: &settings.date_format,
        }
    }

    pub fn money(&self, amount: Money) -> String {
        amount.format_with_symbol(self.currency)
    }

    /// Format a date, falling back to ISO when the configured format is bad
    pub fn date(&self, date: NaiveDate) -> String {
        let mut out = String::new();
        if write!(out, "{}", date.format(self.date_format)).is_err() {
            return date.to_string();
        }
        out
    }
}

impl Default for Style<'static> {
    fn default() -> Self {
        Self {
            currency: "$",
            date_format: "%Y-%m-%d",
        }
    }
}

/// Width of the widest cell in a column, never narrower than its header
pub(crate) fn column_width<'s>(header: &str, cells: impl Iterator<Item = &'s str>) -> usize {
    cells.map(|c| c.chars().count()).max().unwrap_or(0).max(header.len())
}
