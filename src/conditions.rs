//! Declarative predicates over the field store.
//!
//! Skip rules, conditional requirements and disqualification rules all share
//! this one vocabulary so every branch in a questionnaire can be listed,
//! serialized and tested without rendering anything.

use crate::fields::{FieldStore, FieldValue};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equals {
        field: String,
        value: FieldValue,
    },
    NotEquals {
        field: String,
        value: FieldValue,
    },
    IsEmpty {
        field: String,
    },
    Contains {
        field: String,
        item: String,
    },
    /// Any selection besides the group's sentinel
    ContainsOtherThan {
        field: String,
        #[serde(default)]
        sentinel: Option<String>,
    },
    NumberBelow {
        field: String,
        threshold: f64,
    },
    NumberAbove {
        field: String,
        threshold: f64,
    },
    /// Date of birth (`YYYY-MM-DD` or `MM/DD/YYYY`) younger than `years`
    AgeUnder {
        field: String,
        years: u32,
    },
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
    Not {
        condition: Box<Condition>,
    },
}

impl Condition {
    pub fn equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::NotEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains_other_than(field: impl Into<String>, sentinel: Option<&str>) -> Self {
        Self::ContainsOtherThan {
            field: field.into(),
            sentinel: sentinel.map(str::to_string),
        }
    }

    pub fn number_below(field: impl Into<String>, threshold: f64) -> Self {
        Self::NumberBelow {
            field: field.into(),
            threshold,
        }
    }

    pub fn age_under(field: impl Into<String>, years: u32) -> Self {
        Self::AgeUnder {
            field: field.into(),
            years,
        }
    }

    pub fn evaluate(&self, store: &FieldStore) -> bool {
        self.evaluate_as_of(store, Utc::now().date_naive())
    }

    /// Evaluate with an explicit "today" for date-relative rules
    pub fn evaluate_as_of(&self, store: &FieldStore, today: NaiveDate) -> bool {
        match self {
            Self::Equals { field, value } => values_match(&store.get_field(field), value),
            Self::NotEquals { field, value } => !values_match(&store.get_field(field), value),
            Self::IsEmpty { field } => store.get_field(field).is_empty(),
            Self::Contains { field, item } => store
                .get_field(field)
                .as_list()
                .is_some_and(|items| items.iter().any(|i| i == item)),
            Self::ContainsOtherThan { field, sentinel } => {
                let sentinel = sentinel.as_deref().or_else(|| store.sentinel(field));
                store
                    .get_field(field)
                    .as_list()
                    .is_some_and(|items| items.iter().any(|i| Some(i.as_str()) != sentinel))
            }
            Self::NumberBelow { field, threshold } => store
                .get_field(field)
                .as_number()
                .is_some_and(|n| n < *threshold),
            Self::NumberAbove { field, threshold } => store
                .get_field(field)
                .as_number()
                .is_some_and(|n| n > *threshold),
            Self::AgeUnder { field, years } => store
                .get_field(field)
                .as_str()
                .and_then(parse_date)
                .and_then(|dob| age_on(dob, today))
                .is_some_and(|age| age < *years),
            Self::All { conditions } => conditions.iter().all(|c| c.evaluate_as_of(store, today)),
            Self::Any { conditions } => conditions.iter().any(|c| c.evaluate_as_of(store, today)),
            Self::Not { condition } => !condition.evaluate_as_of(store, today),
        }
    }

    /// Every field this condition reads
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Equals { field, .. }
            | Self::NotEquals { field, .. }
            | Self::IsEmpty { field }
            | Self::Contains { field, .. }
            | Self::ContainsOtherThan { field, .. }
            | Self::NumberBelow { field, .. }
            | Self::NumberAbove { field, .. }
            | Self::AgeUnder { field, .. } => vec![field.as_str()],
            Self::All { conditions } | Self::Any { conditions } => {
                conditions.iter().flat_map(Condition::fields).collect()
            }
            Self::Not { condition } => condition.fields(),
        }
    }
}

fn values_match(actual: &FieldValue, expected: &FieldValue) -> bool {
    if actual == expected {
        return true;
    }
    match (actual.as_comparable(), expected.as_comparable()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(&b),
        _ => false,
    }
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

fn age_on(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
    if dob > today {
        return None;
    }
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}
