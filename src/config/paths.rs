//! Path management for the cashflow engine
//!
//! ## Path Resolution Order
//!
//! 1. `CASHFLOW_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/cashflow` or `~/.config/cashflow`
//! 3. Windows: `%APPDATA%\cashflow`

use std::path::PathBuf;

use crate::error::{EngineError, EngineResult};

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "CASHFLOW_DATA_DIR";

#[derive(Debug, Clone)]
pub struct CashflowPaths {
    base_dir: PathBuf,
}

impl CashflowPaths {
    /// Resolve the base directory from the environment
    pub fn new() -> EngineResult<Self> {
        let base_dir = match std::env::var(DATA_DIR_ENV) {
            Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Use an explicit base directory (tests, embedding)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    /// The single JSON file holding every table
    pub fn data_file(&self) -> PathBuf {
        self.data_dir().join("cashflow.json")
    }

    pub fn ensure_directories(&self) -> EngineResult<()> {
        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| EngineError::Io(format!("Failed to create data directory: {}", e)))?;
        Ok(())
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> EngineResult<PathBuf> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => {
            let home = std::env::var("HOME").map_err(|_| {
                EngineError::Config("Could not determine home directory".into())
            })?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("cashflow"))
}

#[cfg(windows)]
fn resolve_default_path() -> EngineResult<PathBuf> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| EngineError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("cashflow"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = CashflowPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(
            paths.data_file(),
            temp_dir.path().join("data").join("cashflow.json")
        );
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert_eq!(paths.audit_log(), temp_dir.path().join("audit.log"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = CashflowPaths::with_base_dir(temp_dir.path().join("nested"));
        paths.ensure_directories().unwrap();
        assert!(paths.data_dir().exists());
    }
}
