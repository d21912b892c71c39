use crate::constants::events;
use crate::segments::SegmentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Abandonment telemetry event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TelemetryKind {
    #[serde(rename = "intake.segment_reached")]
    SegmentReached,
    #[serde(rename = "intake.ineligible")]
    Ineligible,
    #[serde(rename = "intake.submitted")]
    Submitted,
}

impl TelemetryKind {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SegmentReached => events::SEGMENT_REACHED,
            Self::Ineligible => events::INELIGIBLE,
            Self::Submitted => events::SUBMITTED,
        }
    }

    /// Terminal kinds end the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ineligible | Self::Submitted)
    }
}

impl fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// One report sent to the abandonment endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(rename = "event")]
    pub kind: TelemetryKind,
    pub session_id: String,
    pub segment_index: usize,
    pub segment_id: SegmentId,
    /// Identity fields captured so far (email, phone, name)
    pub identity: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(
        kind: TelemetryKind,
        session_id: impl Into<String>,
        segment_index: usize,
        segment_id: SegmentId,
        identity: BTreeMap<String, String>,
    ) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
            segment_index,
            segment_id,
            identity,
            timestamp: Utc::now(),
        }
    }
}
