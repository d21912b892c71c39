use crate::segments::SegmentId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Events that drive navigation transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// Move forward to the navigator's next segment
    Advance { to: usize },
    /// Move back to the navigator's previous segment
    Retreat { to: usize },
    /// A disqualification rule matched on this segment
    Disqualify { segment_id: SegmentId },
    /// The persistence API accepted the payload
    Submit,
}

impl FlowEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::Retreat { .. } => "retreat",
            Self::Disqualify { .. } => "disqualify",
            Self::Submit => "submit",
        }
    }
}

impl fmt::Display for FlowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advance { to } => write!(f, "advance({to})"),
            Self::Retreat { to } => write!(f, "retreat({to})"),
            Self::Disqualify { segment_id } => write!(f, "disqualify({segment_id})"),
            Self::Submit => write!(f, "submit"),
        }
    }
}
