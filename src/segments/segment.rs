use crate::conditions::Condition;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Where a matching skip rule sends the navigator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchTarget {
    /// Hide the next `count` segments
    SkipNext { count: usize },
    /// Jump forward to a named segment
    Segment { id: SegmentId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRule {
    pub when: Condition,
    pub target: BranchTarget,
}

impl SkipRule {
    pub fn skip_next(when: Condition, count: usize) -> Self {
        Self {
            when,
            target: BranchTarget::SkipNext { count },
        }
    }

    pub fn jump_to(when: Condition, id: impl Into<String>) -> Self {
        Self {
            when,
            target: BranchTarget::Segment {
                id: SegmentId::new(id),
            },
        }
    }
}

/// One page of a questionnaire and the fields it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub field_names: Vec<String>,
    /// Only shown when an earlier skip rule does not hide it
    #[serde(default)]
    pub is_conditional: bool,
    /// Evaluated in order; the first match decides the next segment
    #[serde(default)]
    pub skip_rules: Vec<SkipRule>,
}

impl Segment {
    pub fn new<I, S>(id: impl Into<String>, field_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: SegmentId::new(id),
            field_names: field_names.into_iter().map(Into::into).collect(),
            is_conditional: false,
            skip_rules: Vec::new(),
        }
    }

    pub fn conditional(mut self) -> Self {
        self.is_conditional = true;
        self
    }

    pub fn with_skip_rule(mut self, rule: SkipRule) -> Self {
        self.skip_rules.push(rule);
        self
    }

    pub fn owns(&self, field: &str) -> bool {
        self.field_names.iter().any(|f| f == field)
    }
}
