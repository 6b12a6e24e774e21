//! Engine settings
//!
//! Policies the engine leaves to the user (re-paying a paid bill, envelope
//! transfers that overdraw the source, keyword matching) plus display
//! preferences. Every field has a default so older config files keep loading.

use serde::{Deserialize, Serialize};

use super::paths::CashflowPaths;
use crate::error::{EngineError, EngineResult};
use crate::models::Money;

/// What to do when a bill or income occurrence is confirmed twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePaymentPolicy {
    /// Fail with a duplicate error
    #[default]
    Reject,
    /// Remove the earlier payment and its ledger entry, then record the new one
    Replace,
}

/// Whether an envelope transfer may push the source below zero remaining
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeTransferPolicy {
    /// Permit it; the source is reported over budget
    #[default]
    AllowOverBudget,
    /// Reject with a validation error
    ForbidOverBudget,
}

/// Keyword matching used by the categorizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategyKind {
    Substring,
    #[default]
    CaseInsensitive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub duplicate_payment: DuplicatePaymentPolicy,

    #[serde(default)]
    pub envelope_transfer: EnvelopeTransferPolicy,

    #[serde(default)]
    pub match_strategy: MatchStrategyKind,

    /// Projected balances below this are flagged as warnings
    #[serde(default = "default_low_balance_warning")]
    pub low_balance_warning: Money,

    #[serde(default = "default_currency")]
    pub currency_symbol: String,

    /// strftime format for dates in CLI output
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_low_balance_warning() -> Money {
    Money::from_units(100)
}

fn default_currency() -> String {
    "$".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            duplicate_payment: DuplicatePaymentPolicy::default(),
            envelope_transfer: EnvelopeTransferPolicy::default(),
            match_strategy: MatchStrategyKind::default(),
            low_balance_warning: default_low_balance_warning(),
            currency_symbol: default_currency(),
            date_format: default_date_format(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or defaults if the file doesn't exist
    pub fn load_or_create(paths: &CashflowPaths) -> EngineResult<Self> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| EngineError::Io(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse settings file: {}", e)))
    }

    pub fn save(&self, paths: &CashflowPaths) -> EngineResult<()> {
        std::fs::create_dir_all(paths.base_dir())
            .map_err(|e| EngineError::Io(format!("Failed to create config directory: {}", e)))?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| EngineError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.duplicate_payment, DuplicatePaymentPolicy::Reject);
        assert_eq!(
            settings.envelope_transfer,
            EnvelopeTransferPolicy::AllowOverBudget
        );
        assert_eq!(settings.match_strategy, MatchStrategyKind::CaseInsensitive);
        assert_eq!(settings.low_balance_warning, Money::from_units(100));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = CashflowPaths::with_base_dir(temp_dir.path().to_path_buf());

        let settings = Settings {
            duplicate_payment: DuplicatePaymentPolicy::Replace,
            envelope_transfer: EnvelopeTransferPolicy::ForbidOverBudget,
            ..Settings::default()
        };
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.duplicate_payment, DuplicatePaymentPolicy::Replace);
        assert_eq!(
            loaded.envelope_transfer,
            EnvelopeTransferPolicy::ForbidOverBudget
        );
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"duplicate_payment": "replace"}"#).unwrap();
        assert_eq!(settings.duplicate_payment, DuplicatePaymentPolicy::Replace);
        assert_eq!(settings.currency_symbol, "$");
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = CashflowPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), "{\"match_strategy\": \"fuzzy\"}").unwrap();

        let err = Settings::load_or_create(&paths).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
