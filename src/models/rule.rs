//! Categorization rule model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{EnvelopeId, RuleId};

/// Keyword that suggests an envelope for matching descriptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationRule {
    pub id: RuleId,
    pub envelope_id: EnvelopeId,
    pub keyword: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl CategorizationRule {
    pub fn new(envelope_id: EnvelopeId, keyword: impl Into<String>) -> Self {
        Self {
            id: RuleId::new(),
            envelope_id,
            keyword: keyword.into(),
            active: true,
            created_at: Utc::now(),
        }
    }
}
