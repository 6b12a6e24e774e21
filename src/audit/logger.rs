//! Append-only JSONL audit log
//!
//! One JSON object per line. A write transaction's entries are appended in a
//! single batch after the transaction commits.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

use super::entry::AuditEntry;

pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Append entries and flush once
    pub fn log_batch(&self, entries: &[AuditEntry]) -> EngineResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::Io(format!("Failed to create audit directory: {}", e)))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| EngineError::Io(format!("Failed to open audit log: {}", e)))?;
        let mut writer = BufWriter::new(file);

        for entry in entries {
            let json = serde_json::to_string(entry)
                .map_err(|e| EngineError::Json(format!("Failed to serialize audit entry: {}", e)))?;
            writeln!(writer, "{}", json)
                .map_err(|e| EngineError::Io(format!("Failed to write audit entry: {}", e)))?;
        }

        writer
            .flush()
            .map_err(|e| EngineError::Io(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Read all entries, oldest first
    pub fn read_all(&self) -> EngineResult<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| EngineError::Io(format!("Failed to open audit log: {}", e)))?;

        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                EngineError::Io(format!("Failed to read audit log line {}: {}", line_num + 1, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                EngineError::Json(format!(
                    "Failed to parse audit entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Read the most recent `count` entries
    pub fn read_recent(&self, count: usize) -> EngineResult<Vec<AuditEntry>> {
        let mut all = self.read_all()?;
        let start = all.len().saturating_sub(count);
        Ok(all.split_off(start))
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}
