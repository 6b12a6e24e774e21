//! Categorizer
//!
//! Suggests an envelope for a transaction description from keyword rules.
//! Matching is a pure function over a snapshot of rules; nothing here
//! mutates a transaction.

use tracing::debug;

use crate::config::MatchStrategyKind;
use crate::error::{EngineError, EngineResult};
use crate::models::{CategorizationRule, EntityRef, EnvelopeId, RuleId};
use crate::storage::Storage;

/// How a rule keyword is compared against a description
pub trait MatchStrategy {
    fn matches(&self, keyword: &str, description: &str) -> bool;
}

/// Exact substring match
#[derive(Debug, Clone, Copy, Default)]
pub struct Substring;

impl MatchStrategy for Substring {
    fn matches(&self, keyword: &str, description: &str) -> bool {
        description.contains(keyword)
    }
}

/// Substring match ignoring case
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl MatchStrategy for CaseInsensitive {
    fn matches(&self, keyword: &str, description: &str) -> bool {
        description.to_lowercase().contains(&keyword.to_lowercase())
    }
}

/// The strategy configured by a settings value
pub fn strategy_for(kind: MatchStrategyKind) -> &'static dyn MatchStrategy {
    match kind {
        MatchStrategyKind::Substring => &Substring,
        MatchStrategyKind::CaseInsensitive => &CaseInsensitive,
    }
}

/// First active rule, in the given order, whose keyword matches
///
/// Rules with a blank keyword never match.
pub fn suggest(rules: &[CategorizationRule], description: &str, strategy: &dyn MatchStrategy) -> Option<EnvelopeId> {
    rules
        .iter()
        .filter(|r| r.active && !r.keyword.trim().is_empty())
        .find(|r| strategy.matches(&r.keyword, description))
        .map(|r| r.envelope_id)
}

/// Service for categorization rules
pub struct RuleService<'a> {
    storage: &'a Storage,
    strategy: MatchStrategyKind,
}

impl<'a> RuleService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            strategy: MatchStrategyKind::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: MatchStrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Add a keyword rule pointing at an envelope
    pub fn add(&self, envelope: EnvelopeId, keyword: &str) -> EngineResult<CategorizationRule> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(EngineError::Validation("Rule keyword cannot be empty".into()));
        }

        let rule = CategorizationRule::new(envelope, keyword);
        self.storage.write(|txn| {
            txn.ensure_reference(EntityRef::Envelope(envelope))?;
            if txn
                .rules
                .iter()
                .any(|r| r.envelope_id == envelope && r.keyword.eq_ignore_ascii_case(keyword))
            {
                return Err(EngineError::duplicate("CategorizationRule", keyword));
            }
            txn.insert(rule.clone())?;
            Ok(rule)
        })
    }

    pub fn set_active(&self, id: RuleId, active: bool) -> EngineResult<CategorizationRule> {
        self.storage
            .write(|txn| txn.modify::<CategorizationRule>(id, |r| r.active = active))
    }

    pub fn remove(&self, id: RuleId) -> EngineResult<()> {
        self.storage.write(|txn| {
            txn.delete(EntityRef::Rule(id))?;
            Ok(())
        })
    }

    /// Rules in matching order
    pub fn list(&self) -> EngineResult<Vec<CategorizationRule>> {
        self.storage
            .read(|data| data.rules_in_order().into_iter().cloned().collect())
    }

    /// Suggest an envelope for a description against the current rules
    pub fn suggest_for(&self, description: &str) -> EngineResult<Option<EnvelopeId>> {
        let rules = self.list()?;
        let suggestion = suggest(&rules, description, strategy_for(self.strategy));
        debug!(description, ?suggestion, "categorizer suggestion");
        Ok(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Envelope, Money, RecurrenceKind};
    use crate::services::EnvelopeService;
    use chrono::{Duration, Utc};

    fn rule(envelope: EnvelopeId, keyword: &str, offset_secs: i64) -> CategorizationRule {
        let mut rule = CategorizationRule::new(envelope, keyword);
        rule.created_at = Utc::now() + Duration::seconds(offset_secs);
        rule
    }

    #[test]
    fn test_first_active_rule_wins() {
        let (groceries, dining) = (EnvelopeId::new(), EnvelopeId::new());
        let mut inactive = rule(dining, "market", 0);
        inactive.active = false;
        let rules = vec![inactive, rule(groceries, "market", 1), rule(dining, "market", 2)];

        assert_eq!(
            suggest(&rules, "Farmers Market Downtown", &CaseInsensitive),
            Some(groceries)
        );
    }

    #[test]
    fn test_strategies_differ_on_case() {
        let groceries = EnvelopeId::new();
        let rules = vec![rule(groceries, "Costco", 0)];

        assert_eq!(suggest(&rules, "COSTCO WHOLESALE", &Substring), None);
        assert_eq!(suggest(&rules, "COSTCO WHOLESALE", &CaseInsensitive), Some(groceries));
        assert_eq!(suggest(&rules, "Costco gas", &Substring), Some(groceries));
    }

    #[test]
    fn test_no_match_and_blank_keyword() {
        let envelope = EnvelopeId::new();
        let rules = vec![rule(envelope, "  ", 0)];
        assert_eq!(suggest(&rules, "anything", &CaseInsensitive), None);
        assert_eq!(suggest(&[], "anything", &CaseInsensitive), None);
    }

    #[test]
    fn test_service_suggests_and_validates() {
        let storage = Storage::in_memory();
        let groceries = EnvelopeService::new(&storage)
            .create(Envelope::new("Groceries", Money::from_units(300), RecurrenceKind::Monthly))
            .unwrap();

        let service = RuleService::new(&storage);
        service.add(groceries.id, "whole foods").unwrap();

        assert_eq!(
            service.suggest_for("WHOLE FOODS #123").unwrap(),
            Some(groceries.id)
        );
        assert_eq!(
            RuleService::new(&storage)
                .with_strategy(MatchStrategyKind::Substring)
                .suggest_for("WHOLE FOODS #123")
                .unwrap(),
            None
        );

        let dup = service.add(groceries.id, "Whole Foods").unwrap_err();
        assert!(matches!(dup, EngineError::Duplicate { .. }));
        assert!(service.add(groceries.id, " ").unwrap_err().is_validation());
        let missing = service.add(EnvelopeId::new(), "x").unwrap_err();
        assert!(matches!(missing, EngineError::Referential { .. }));
    }
}
