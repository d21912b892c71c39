use crate::error::IntakeError;
use thiserror::Error;

/// Failures raised while moving between navigation states
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Transition rejected: {reason}")]
    Rejected { reason: String },

    #[error("Invalid state transition from {from} with event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Navigation snapshot is inconsistent: {0}")]
    CorruptSnapshot(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("Flow is already {state}; no further navigation is allowed")]
    TerminalState { state: String },

    #[error("Segment index {index} out of range for {count} segments")]
    OutOfRange { index: usize, count: usize },

    #[error("Event {event} cannot move the flow from {from} to {to}")]
    Disallowed {
        from: String,
        to: String,
        event: String,
    },
}

impl From<GuardError> for StateMachineError {
    fn from(err: GuardError) -> Self {
        StateMachineError::Rejected {
            reason: err.to_string(),
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;

impl From<StateMachineError> for IntakeError {
    fn from(err: StateMachineError) -> Self {
        IntakeError::StateMachine(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_error_becomes_rejection() {
        let guard_err = GuardError::TerminalState {
            state: "submitted".to_string(),
        };
        let sm_err: StateMachineError = guard_err.into();

        match &sm_err {
            StateMachineError::Rejected { reason } => {
                assert!(reason.contains("already submitted"));
            }
            other => panic!("Expected Rejected error, got {other:?}"),
        }

        let intake: IntakeError = sm_err.into();
        assert!(matches!(intake, IntakeError::StateMachine(_)));
    }

    #[test]
    fn test_error_messages() {
        let err = GuardError::OutOfRange { index: 9, count: 4 };
        assert_eq!(err.to_string(), "Segment index 9 out of range for 4 segments");
    }
}
