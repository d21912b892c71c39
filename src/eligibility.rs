//! Eligibility evaluator
//!
//! Pure predicates checked right after a segment validates and before the
//! navigator advances. A match diverts the flow to the terminal ineligible
//! state.

use crate::conditions::Condition;
use crate::fields::FieldStore;
use crate::segments::SegmentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisqualificationRule {
    /// Segment whose answers this rule inspects
    pub segment_id: SegmentId,
    pub when: Condition,
    /// Short machine-readable reason for logs and telemetry
    pub reason: String,
}

impl DisqualificationRule {
    pub fn new(segment_id: impl Into<String>, when: Condition, reason: impl Into<String>) -> Self {
        Self {
            segment_id: SegmentId::new(segment_id),
            when,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EligibilityEvaluator {
    rules: Vec<DisqualificationRule>,
}

impl EligibilityEvaluator {
    pub fn new(rules: Vec<DisqualificationRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[DisqualificationRule] {
        &self.rules
    }

    pub fn check_disqualification(&self, segment_id: &SegmentId, store: &FieldStore) -> bool {
        self.disqualifying_rule(segment_id, store).is_some()
    }

    /// First rule of `segment_id` that matches the current answers
    pub fn disqualifying_rule(
        &self,
        segment_id: &SegmentId,
        store: &FieldStore,
    ) -> Option<&DisqualificationRule> {
        self.rules
            .iter()
            .filter(|rule| &rule.segment_id == segment_id)
            .find(|rule| rule.when.evaluate(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldDef, FieldKind, FieldSchema, FieldValue};

    fn store() -> FieldStore {
        FieldStore::new(
            FieldSchema::new()
                .with("age", FieldDef::new(FieldKind::Text))
                .with("nitrates", FieldDef::new(FieldKind::Text))
                .with(
                    "heart_conditions",
                    FieldDef::new(FieldKind::MultiSelect).with_sentinel("none"),
                ),
        )
    }

    fn evaluator() -> EligibilityEvaluator {
        EligibilityEvaluator::new(vec![
            DisqualificationRule::new("basics", Condition::number_below("age", 18.0), "under_age"),
            DisqualificationRule::new(
                "medications",
                Condition::equals("nitrates", "yes"),
                "nitrate_use",
            ),
            DisqualificationRule::new(
                "medications",
                Condition::contains_other_than("heart_conditions", None),
                "heart_condition",
            ),
        ])
    }

    #[test]
    fn test_under_age() {
        let mut store = store();
        store.set_field("age", FieldValue::text("16")).unwrap();
        assert!(evaluator().check_disqualification(&"basics".into(), &store));

        store.set_field("age", FieldValue::text("35")).unwrap();
        assert!(!evaluator().check_disqualification(&"basics".into(), &store));
    }

    #[test]
    fn test_rules_scoped_to_their_segment() {
        let mut store = store();
        store.set_field("age", FieldValue::text("16")).unwrap();
        assert!(!evaluator().check_disqualification(&"medications".into(), &store));
    }

    #[test]
    fn test_checklist_with_sentinel_only_is_eligible() {
        let evaluator = evaluator();
        let mut store = store();
        store.set_array_field("heart_conditions", "none", true).unwrap();
        assert!(!evaluator.check_disqualification(&"medications".into(), &store));

        store.set_array_field("heart_conditions", "arrhythmia", true).unwrap();
        let rule = evaluator
            .disqualifying_rule(&"medications".into(), &store)
            .unwrap();
        assert_eq!(rule.reason, "heart_condition");
    }
}
