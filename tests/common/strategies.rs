//! Proptest strategies for answers and checklist operations

use proptest::prelude::*;

pub fn checklist_item_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("none".to_string()),
        Just("diabetes".to_string()),
        Just("hypertension".to_string()),
        Just("asthma".to_string()),
        Just("migraine".to_string()),
    ]
}

/// Sequences of (item, included) toggles against one checklist
pub fn checklist_ops_strategy() -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::vec((checklist_item_strategy(), any::<bool>()), 0..24)
}

/// Arbitrary free-text answer, including blanks and numbers
pub fn answer_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("yes".to_string()),
        Just("no".to_string()),
        "[a-z]{1,12}",
        (0u32..500).prop_map(|n| n.to_string()),
    ]
}

/// Heights and weights in plausible and implausible ranges, zeros included
pub fn body_strategy() -> impl Strategy<Value = (u32, u32, u32)> {
    (0u32..9, 0u32..12, 0u32..700)
}
