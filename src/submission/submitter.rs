use super::payload::SubmissionPayload;
use crate::collaborators::{CreateResponse, PersistenceApi};
use crate::error::{IntakeError, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// What a successful submit returns to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub payload: SubmissionPayload,
    /// Stored record as echoed by the persistence API
    pub record: Option<Value>,
}

#[derive(Debug, Clone, Default)]
enum SubmitterState {
    #[default]
    Idle,
    /// Assembled, not yet accepted; reused verbatim on retry
    Pending(SubmissionPayload),
    Submitted(SubmissionReceipt),
}

/// Hands one payload to the persistence API exactly once
#[derive(Debug)]
pub struct Submitter {
    api: Arc<dyn PersistenceApi>,
    state: SubmitterState,
}

impl Submitter {
    pub fn new(api: Arc<dyn PersistenceApi>) -> Self {
        Self {
            api,
            state: SubmitterState::Idle,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.state, SubmitterState::Submitted(_))
    }

    /// Payload kept from a failed attempt
    pub fn pending_payload(&self) -> Option<&SubmissionPayload> {
        match &self.state {
            SubmitterState::Pending(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        match &self.state {
            SubmitterState::Submitted(receipt) => Some(receipt),
            _ => None,
        }
    }

    /// Send the pending payload, or one built by `assemble` if none is pending
    pub async fn submit<F>(&mut self, assemble: F) -> Result<SubmissionReceipt>
    where
        F: FnOnce() -> SubmissionPayload,
    {
        let payload = match &self.state {
            SubmitterState::Submitted(_) => return Err(IntakeError::AlreadySubmitted),
            SubmitterState::Pending(payload) => payload.clone(),
            SubmitterState::Idle => assemble(),
        };
        self.state = SubmitterState::Pending(payload.clone());

        match self.api.create(&payload).await {
            Ok(CreateResponse {
                success: true,
                result,
                ..
            }) => {
                info!(fields = payload.len(), "Submission accepted");
                let receipt = SubmissionReceipt {
                    payload,
                    record: result,
                };
                self.state = SubmitterState::Submitted(receipt.clone());
                Ok(receipt)
            }
            Ok(CreateResponse { error, .. }) => {
                let reason = error.unwrap_or_else(|| "create returned success=false".to_string());
                warn!(reason = %reason, "Submission rejected, payload kept for retry");
                Err(IntakeError::SubmissionTransport(reason))
            }
            Err(e) => {
                warn!(error = %e, "Submission failed, payload kept for retry");
                Err(IntakeError::SubmissionTransport(e.to_string()))
            }
        }
    }
}
