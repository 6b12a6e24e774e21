//! Where a committed dataset and its audit trail end up

use std::path::PathBuf;
use std::sync::Mutex;

use crate::audit::{AuditEntry, AuditLogger};
use crate::config::paths::CashflowPaths;
use crate::error::{EngineError, EngineResult};

use super::dataset::Dataset;
use super::file_io::{read_json, write_json_atomic};

/// Durable home for the dataset
///
/// `persist` is called with the complete post-commit dataset while the
/// writer lock is held; if it fails the commit is abandoned.
pub trait Backend: Send + Sync {
    fn load(&self) -> EngineResult<Dataset>;

    fn persist(&self, data: &Dataset) -> EngineResult<()>;

    fn append_audit(&self, entries: &[AuditEntry]) -> EngineResult<()>;

    fn audit_trail(&self) -> EngineResult<Vec<AuditEntry>>;
}

/// Keeps nothing on disk; audit entries stay in memory
#[derive(Default)]
pub struct MemoryBackend {
    audit: Mutex<Vec<AuditEntry>>,
}

impl Backend for MemoryBackend {
    fn load(&self) -> EngineResult<Dataset> {
        Ok(Dataset::new())
    }

    fn persist(&self, _data: &Dataset) -> EngineResult<()> {
        Ok(())
    }

    fn append_audit(&self, entries: &[AuditEntry]) -> EngineResult<()> {
        let mut audit = self.audit.lock().map_err(|e| {
            EngineError::Storage(format!("Failed to acquire audit lock: {}", e))
        })?;
        audit.extend_from_slice(entries);
        Ok(())
    }

    fn audit_trail(&self) -> EngineResult<Vec<AuditEntry>> {
        let audit = self.audit.lock().map_err(|e| {
            EngineError::Storage(format!("Failed to acquire audit lock: {}", e))
        })?;
        Ok(audit.clone())
    }
}

/// One JSON file for the dataset plus a JSONL audit log
pub struct JsonFileBackend {
    data_file: PathBuf,
    audit: AuditLogger,
}

impl JsonFileBackend {
    pub fn new(data_file: PathBuf, audit_log: PathBuf) -> Self {
        Self {
            data_file,
            audit: AuditLogger::new(audit_log),
        }
    }

    pub fn from_paths(paths: &CashflowPaths) -> Self {
        Self::new(paths.data_file(), paths.audit_log())
    }
}

impl Backend for JsonFileBackend {
    fn load(&self) -> EngineResult<Dataset> {
        read_json(&self.data_file)
    }

    fn persist(&self, data: &Dataset) -> EngineResult<()> {
        write_json_atomic(&self.data_file, data)
    }

    fn append_audit(&self, entries: &[AuditEntry]) -> EngineResult<()> {
        self.audit.log_batch(entries)
    }

    fn audit_trail(&self) -> EngineResult<Vec<AuditEntry>> {
        self.audit.read_all()
    }
}
