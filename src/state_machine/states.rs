use crate::segments::SegmentId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Navigation state of one intake flow
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    /// Showing the segment at this position
    Segment { index: usize },
    /// Diverted by a disqualifying answer on `segment_id`
    Ineligible { segment_id: SegmentId },
    /// Payload accepted by the persistence API
    Submitted,
}

impl FlowState {
    pub fn segment(index: usize) -> Self {
        Self::Segment { index }
    }

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ineligible { .. } | Self::Submitted)
    }

    /// Check if the respondent is still answering questions
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Segment { .. })
    }

    pub fn segment_index(&self) -> Option<usize> {
        match self {
            Self::Segment { index } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Segment { index } => write!(f, "segment_{index}"),
            Self::Ineligible { .. } => write!(f, "ineligible"),
            Self::Submitted => write!(f, "submitted"),
        }
    }
}

/// Default state for new flows
impl Default for FlowState {
    fn default() -> Self {
        Self::Segment { index: 0 }
    }
}
