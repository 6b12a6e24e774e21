//! Audit entry data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::TableKind;

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

/// One committed change to one row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,

    pub operation: Operation,

    pub entity_type: TableKind,

    pub entity_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,

    /// Row before the change (updates and deletes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,

    /// Row after the change (creates and updates)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_summary: Option<String>,
}

impl AuditEntry {
    fn base(operation: Operation, entity_type: TableKind, entity_id: String, entity_name: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            entity_type,
            entity_id,
            entity_name,
            before: None,
            after: None,
            diff_summary: None,
        }
    }

    pub fn create(entity_type: TableKind, entity_id: impl Into<String>, entity_name: Option<String>, after: Value) -> Self {
        Self {
            after: Some(after),
            ..Self::base(Operation::Create, entity_type, entity_id.into(), entity_name)
        }
    }

    pub fn update(
        entity_type: TableKind,
        entity_id: impl Into<String>,
        entity_name: Option<String>,
        before: Value,
        after: Value,
    ) -> Self {
        let diff_summary = changed_fields(&before, &after);
        Self {
            before: Some(before),
            after: Some(after),
            diff_summary,
            ..Self::base(Operation::Update, entity_type, entity_id.into(), entity_name)
        }
    }

    pub fn delete(entity_type: TableKind, entity_id: impl Into<String>, entity_name: Option<String>, before: Value) -> Self {
        Self {
            before: Some(before),
            ..Self::base(Operation::Delete, entity_type, entity_id.into(), entity_name)
        }
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation,
            self.entity_type,
            self.entity_id
        );

        if let Some(name) = &self.entity_name {
            output.push_str(&format!(" ({})", name));
        }

        if let Some(diff) = &self.diff_summary {
            output.push_str(&format!("\n  Changes: {}", diff));
        }

        output
    }
}

/// Summarize top-level fields that differ, e.g. `amount: 1000 -> 1500`
///
/// Timestamps bumped by every update are left out.
pub fn changed_fields(before: &Value, after: &Value) -> Option<String> {
    let (Value::Object(before), Value::Object(after)) = (before, after) else {
        return (before != after).then(|| format!("{} -> {}", before, after));
    };

    let changes: Vec<String> = after
        .iter()
        .filter(|(key, _)| key.as_str() != "updated_at")
        .filter_map(|(key, new)| {
            let old = before.get(key).unwrap_or(&Value::Null);
            (old != new).then(|| format!("{}: {} -> {}", key, old, new))
        })
        .collect();

    if changes.is_empty() {
        None
    } else {
        Some(changes.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_entry_serializes_compactly() {
        let entry = AuditEntry::create(
            TableKind::Accounts,
            "acc-12345678",
            Some("Checking".to_string()),
            json!({"name": "Checking"}),
        );
        let line = serde_json::to_string(&entry).unwrap();
        assert!(line.contains("\"operation\":\"create\""));
        assert!(line.contains("\"entity_type\":\"accounts\""));
        assert!(!line.contains("before"));
    }

    #[test]
    fn test_update_records_changed_fields() {
        let entry = AuditEntry::update(
            TableKind::Bills,
            "bill-12345678",
            None,
            json!({"amount": 1000, "name": "Rent", "updated_at": "a"}),
            json!({"amount": 1500, "name": "Rent", "updated_at": "b"}),
        );
        assert_eq!(entry.diff_summary.as_deref(), Some("amount: 1000 -> 1500"));
    }

    #[test]
    fn test_no_diff_for_identical_rows() {
        let row = json!({"keyword": "grocer"});
        assert_eq!(changed_fields(&row, &row), None);
    }

    #[test]
    fn test_human_readable() {
        let entry = AuditEntry::delete(
            TableKind::Envelopes,
            "env-12345678",
            Some("Dining".into()),
            json!({}),
        );
        let text = entry.format_human_readable();
        assert!(text.contains("DELETE Envelope env-12345678 (Dining)"));
    }
}
