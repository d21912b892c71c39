//! Error types for the intake flow engine.
//!
//! Validation failures and disqualifications are not errors: they surface as
//! [`NavigationOutcome`](crate::flow::NavigationOutcome) variants. Only the
//! conditions below propagate through `Result`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntakeError {
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Flow is closed in terminal state {state}")]
    FlowClosed { state: String },
    #[error("Flow definition error: {0}")]
    Definition(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Submission transport error: {0}")]
    SubmissionTransport(String),
    #[error("Submission already completed")]
    AlreadySubmitted,
    #[error("Segment {segment_id} is not complete")]
    Incomplete { segment_id: String },
    #[error("Upload failed for field {field}: {reason}")]
    Upload { field: String, reason: String },
    #[error("Session storage error: {0}")]
    Session(String),
    #[error("State machine error: {0}")]
    StateMachine(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl IntakeError {
    /// True for failures the user can retry without re-entering answers
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SubmissionTransport(_) | Self::Upload { .. })
    }
}

impl From<serde_json::Error> for IntakeError {
    fn from(error: serde_json::Error) -> Self {
        IntakeError::Serialization(format!("JSON serialization error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;
