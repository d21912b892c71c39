//! Validation gate for segment navigation
//!
//! Validates exactly the fields declared by one segment. Fields owned by other
//! segments, answered or not, never block navigation from the active one.

use crate::conditions::Condition;
use crate::error::{IntakeError, Result};
use crate::fields::{FieldStore, FieldValue};
use crate::segments::{SegmentGraph, SegmentId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const REQUIRED_MESSAGE: &str = "This field is required";
const ONE_OF_MESSAGE: &str = "Please choose one of the listed options";
const NON_EMPTY_LIST_MESSAGE: &str = "Please select at least one option";
const PATTERN_MESSAGE: &str = "Please enter a valid value";

/// A rule attached to a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    Required {
        #[serde(default)]
        message: Option<String>,
    },
    /// Enumerated-value membership, checked only once answered
    OneOf {
        values: Vec<String>,
        #[serde(default)]
        message: Option<String>,
    },
    /// Required only while `when` holds, e.g. an elaboration after "yes"
    RequiredIf {
        when: Condition,
        #[serde(default)]
        message: Option<String>,
    },
    NonEmptyList {
        #[serde(default)]
        message: Option<String>,
    },
    Pattern {
        pattern: String,
        #[serde(default)]
        message: Option<String>,
    },
    NumberRange {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl FieldRule {
    pub fn required() -> Self {
        Self::Required { message: None }
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf {
            values: values.into_iter().map(Into::into).collect(),
            message: None,
        }
    }

    pub fn required_if(when: Condition) -> Self {
        Self::RequiredIf {
            when,
            message: None,
        }
    }

    pub fn non_empty_list() -> Self {
        Self::NonEmptyList { message: None }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: None,
        }
    }

    pub fn number_range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::NumberRange {
            min,
            max,
            message: None,
        }
    }

    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match &mut self {
            Self::Required { message }
            | Self::OneOf { message, .. }
            | Self::RequiredIf { message, .. }
            | Self::NonEmptyList { message }
            | Self::Pattern { message, .. }
            | Self::NumberRange { message, .. } => *message = text,
        }
        self
    }

    /// Field names read by the rule's condition, if any
    pub fn referenced_fields(&self) -> Vec<&str> {
        match self {
            Self::RequiredIf { when, .. } => when.fields(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentValidation {
    pub segment_id: SegmentId,
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

impl SegmentValidation {
    /// Field to focus and scroll into view
    pub fn first_failing_field(&self) -> Option<&str> {
        self.errors.first().map(|e| e.field.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ValidationGate {
    segment_fields: HashMap<SegmentId, Vec<String>>,
    rules: BTreeMap<String, Vec<FieldRule>>,
    patterns: HashMap<String, Regex>,
}

impl ValidationGate {
    pub fn new(graph: &SegmentGraph, rules: BTreeMap<String, Vec<FieldRule>>) -> Result<Self> {
        let segment_fields = graph
            .segments()
            .iter()
            .map(|s| (s.id.clone(), s.field_names.clone()))
            .collect();

        let mut patterns = HashMap::new();
        for rule in rules.values().flatten() {
            if let FieldRule::Pattern { pattern, .. } = rule {
                if !patterns.contains_key(pattern) {
                    let compiled = Regex::new(pattern).map_err(|e| {
                        IntakeError::Definition(format!("invalid pattern '{pattern}': {e}"))
                    })?;
                    patterns.insert(pattern.clone(), compiled);
                }
            }
        }

        Ok(Self {
            segment_fields,
            rules,
            patterns,
        })
    }

    pub fn rules_for(&self, field: &str) -> &[FieldRule] {
        self.rules.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rules(&self) -> &BTreeMap<String, Vec<FieldRule>> {
        &self.rules
    }

    /// Validate the declared fields of one segment, in declared order
    pub fn validate_segment(
        &self,
        segment_id: &SegmentId,
        store: &FieldStore,
    ) -> Result<SegmentValidation> {
        let fields = self.segment_fields.get(segment_id).ok_or_else(|| {
            IntakeError::Definition(format!("unknown segment '{segment_id}'"))
        })?;

        let errors: Vec<FieldError> = fields
            .iter()
            .filter_map(|field| {
                self.validate_field(field, store).map(|message| FieldError {
                    field: field.clone(),
                    message,
                })
            })
            .collect();

        Ok(SegmentValidation {
            segment_id: segment_id.clone(),
            valid: errors.is_empty(),
            errors,
        })
    }

    /// First failing rule's message for one field
    pub fn validate_field(&self, field: &str, store: &FieldStore) -> Option<String> {
        let value = store.get_field(field);
        let answered = store.is_set(field) && !value.is_empty();

        self.rules_for(field)
            .iter()
            .find_map(|rule| self.check(rule, &value, answered, store))
    }

    fn check(
        &self,
        rule: &FieldRule,
        value: &FieldValue,
        answered: bool,
        store: &FieldStore,
    ) -> Option<String> {
        match rule {
            FieldRule::Required { message } if !answered => fail(message, REQUIRED_MESSAGE),
            FieldRule::RequiredIf { when, message } if !answered && when.evaluate(store) => {
                fail(message, REQUIRED_MESSAGE)
            }
            FieldRule::NonEmptyList { message }
                if value.as_list().map_or(true, <[String]>::is_empty) =>
            {
                fail(message, NON_EMPTY_LIST_MESSAGE)
            }
            FieldRule::OneOf { values, message } if answered => {
                let allowed = |candidate: &str| values.iter().any(|v| v == candidate);
                let ok = match value {
                    FieldValue::List(items) => items.iter().all(|item| allowed(item)),
                    other => other.as_comparable().is_some_and(|v| allowed(&v)),
                };
                if ok {
                    None
                } else {
                    fail(message, ONE_OF_MESSAGE)
                }
            }
            FieldRule::Pattern { pattern, message } if answered => {
                let matched = match (self.patterns.get(pattern), value.as_str()) {
                    (Some(regex), Some(text)) => regex.is_match(text.trim()),
                    _ => false,
                };
                if matched {
                    None
                } else {
                    fail(message, PATTERN_MESSAGE)
                }
            }
            FieldRule::NumberRange { min, max, message } if answered => {
                let in_range = value.as_number().is_some_and(|n| {
                    min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
                });
                if in_range {
                    None
                } else {
                    fail(message, &range_message(*min, *max))
                }
            }
            _ => None,
        }
    }
}

fn fail(message: &Option<String>, default: &str) -> Option<String> {
    Some(message.clone().unwrap_or_else(|| default.to_string()))
}

fn range_message(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("Please enter a number between {lo} and {hi}"),
        (Some(lo), None) => format!("Please enter a number of at least {lo}"),
        (None, Some(hi)) => format!("Please enter a number no greater than {hi}"),
        (None, None) => "Please enter a number".to_string(),
    }
}
