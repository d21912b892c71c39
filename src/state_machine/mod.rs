// Navigation state machine for intake flows
//
// Segment positions are ordinary states; `Ineligible` and `Submitted` are
// terminal sentinels outside the index range.

pub mod errors;
pub mod events;
pub mod guards;
pub mod navigation_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{GuardError, StateMachineError, StateMachineResult};
pub use events::FlowEvent;
pub use guards::TransitionGuard;
pub use navigation_state_machine::NavigationStateMachine;
pub use states::FlowState;
