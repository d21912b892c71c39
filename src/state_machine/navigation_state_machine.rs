use super::{
    errors::{StateMachineError, StateMachineResult},
    events::FlowEvent,
    guards::TransitionGuard,
    states::FlowState,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Navigation state machine for one respondent's walk through the segments
///
/// Holds the current state plus the stack of segment indices visited before
/// it, so a resumed session can show where the respondent came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationStateMachine {
    current: FlowState,
    history: Vec<usize>,
    segment_count: usize,
}

impl NavigationStateMachine {
    /// Create a machine positioned on the first segment
    pub fn new(segment_count: usize) -> Self {
        Self {
            current: FlowState::default(),
            history: Vec::new(),
            segment_count,
        }
    }

    /// Rebuild a machine from a persisted snapshot
    pub fn restore(
        current: FlowState,
        history: Vec<usize>,
        segment_count: usize,
    ) -> StateMachineResult<Self> {
        if let Some(index) = current.segment_index() {
            if index >= segment_count {
                return Err(StateMachineError::CorruptSnapshot(format!(
                    "Restored segment index {index} out of range for {segment_count} segments"
                )));
            }
        }
        if let Some(bad) = history.iter().find(|&&index| index >= segment_count) {
            return Err(StateMachineError::CorruptSnapshot(format!(
                "Restored history index {bad} out of range for {segment_count} segments"
            )));
        }

        Ok(Self {
            current,
            history,
            segment_count,
        })
    }

    pub fn current_state(&self) -> &FlowState {
        &self.current
    }

    pub fn history(&self) -> &[usize] {
        &self.history
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Attempt to transition the flow state
    pub fn transition(&mut self, event: FlowEvent) -> StateMachineResult<FlowState> {
        let target_state = Self::determine_target_state(&self.current, &event)?;

        TransitionGuard::can_transition(&self.current, &target_state, &event, self.segment_count)?;

        match (&self.current, &event) {
            (FlowState::Segment { index }, FlowEvent::Advance { .. }) => {
                self.history.push(*index);
            }
            (_, FlowEvent::Retreat { to }) => {
                self.history.retain(|&visited| visited < *to);
            }
            _ => {}
        }

        debug!(
            from = %self.current,
            to = %target_state,
            event = event.event_type(),
            "Flow state transition"
        );

        self.current = target_state.clone();
        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(
        current_state: &FlowState,
        event: &FlowEvent,
    ) -> StateMachineResult<FlowState> {
        let target = match (current_state, event) {
            (FlowState::Segment { .. }, FlowEvent::Advance { to }) => FlowState::segment(*to),
            (FlowState::Segment { .. }, FlowEvent::Retreat { to }) => FlowState::segment(*to),
            (FlowState::Segment { .. }, FlowEvent::Disqualify { segment_id }) => {
                FlowState::Ineligible {
                    segment_id: segment_id.clone(),
                }
            }
            (FlowState::Segment { .. }, FlowEvent::Submit) => FlowState::Submitted,

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.to_string(),
                })
            }
        };

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::SegmentId;

    #[test]
    fn test_advance_and_retreat_track_history() {
        let mut machine = NavigationStateMachine::new(5);
        machine.transition(FlowEvent::Advance { to: 1 }).unwrap();
        machine.transition(FlowEvent::Advance { to: 2 }).unwrap();
        machine.transition(FlowEvent::Advance { to: 4 }).unwrap();
        assert_eq!(machine.history(), &[0, 1, 2]);

        let state = machine.transition(FlowEvent::Retreat { to: 2 }).unwrap();
        assert_eq!(state, FlowState::segment(2));
        assert_eq!(machine.history(), &[0, 1]);
    }

    #[test]
    fn test_disqualify_is_terminal() {
        let mut machine = NavigationStateMachine::new(3);
        machine
            .transition(FlowEvent::Disqualify {
                segment_id: SegmentId::new("basics"),
            })
            .unwrap();
        assert!(machine.is_terminal());

        let result = machine.transition(FlowEvent::Advance { to: 1 });
        assert!(matches!(
            result,
            Err(StateMachineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_advance_must_move_forward() {
        let mut machine = NavigationStateMachine::new(3);
        machine.transition(FlowEvent::Advance { to: 2 }).unwrap();
        let result = machine.transition(FlowEvent::Advance { to: 1 });
        assert!(matches!(result, Err(StateMachineError::Rejected { .. })));
        assert_eq!(machine.current_state(), &FlowState::segment(2));
    }

    #[test]
    fn test_restore_rejects_out_of_range() {
        assert!(NavigationStateMachine::restore(FlowState::segment(3), vec![], 3).is_err());
        assert!(NavigationStateMachine::restore(FlowState::segment(1), vec![5], 3).is_err());

        let machine =
            NavigationStateMachine::restore(FlowState::segment(2), vec![0, 1], 3).unwrap();
        assert_eq!(machine.history(), &[0, 1]);
    }
}
