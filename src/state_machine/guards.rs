use super::errors::{GuardError, GuardResult};
use super::events::FlowEvent;
use super::states::FlowState;

/// Guard conditions for navigation transitions
#[derive(Debug)]
pub struct TransitionGuard;

impl TransitionGuard {
    /// Check if a transition is valid for a flow with `segment_count` segments
    pub fn can_transition(
        from: &FlowState,
        to: &FlowState,
        event: &FlowEvent,
        segment_count: usize,
    ) -> GuardResult<()> {
        use FlowEvent::*;
        use FlowState::*;

        // Terminal states cannot transition
        if from.is_terminal() {
            return Err(GuardError::TerminalState {
                state: from.to_string(),
            });
        }

        if let Segment { index } = to {
            if *index >= segment_count {
                return Err(GuardError::OutOfRange {
                    index: *index,
                    count: segment_count,
                });
            }
        }

        let valid = match (from, to, event) {
            (Segment { index: a }, Segment { index: b }, Advance { .. }) => b > a,
            (Segment { index: a }, Segment { index: b }, Retreat { .. }) => b < a,
            (Segment { .. }, Ineligible { .. }, Disqualify { .. }) => true,
            (Segment { .. }, Submitted, Submit) => true,
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(GuardError::Disallowed {
                from: from.to_string(),
                to: to.to_string(),
                event: event.to_string(),
            })
        }
    }
}
