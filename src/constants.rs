//! # System Constants
//!
//! Event names, storage keys and submission defaults shared across the flow
//! engine. Collaborators (telemetry endpoint, persistence API) match on these
//! names, so they are part of the wire contract.

pub use crate::state_machine::FlowState;

/// Telemetry event names as sent to the abandonment endpoint
pub mod events {
    pub const SEGMENT_REACHED: &str = "intake.segment_reached";
    pub const INELIGIBLE: &str = "intake.ineligible";
    pub const SUBMITTED: &str = "intake.submitted";
}

/// Defaults applied when configuration leaves a value unset
pub mod system {
    /// Session storage key for the anonymous session id
    pub const SESSION_STORAGE_KEY: &str = "intake_session_id";
    /// Field that receives the generated record identifier
    pub const DEFAULT_ID_FIELD: &str = "authid";
    /// Field that receives the default record status
    pub const DEFAULT_STATUS_FIELD: &str = "status";
    /// Status assigned to freshly submitted records
    pub const DEFAULT_STATUS: &str = "pending";
    /// Field that receives the submission timestamp
    pub const DEFAULT_TIMESTAMP_FIELD: &str = "submitted_at";
    /// Window in which identity edits on one segment are coalesced
    pub const DEFAULT_TELEMETRY_DEBOUNCE_MS: u64 = 1500;
    pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;
    /// Capacity of field-change broadcast channels
    pub const FIELD_CHANGE_CHANNEL_CAPACITY: usize = 256;
}

/// Unit conversions used by derived fields
pub mod units {
    pub const KG_PER_POUND: f64 = 0.453592;
    pub const METERS_PER_INCH: f64 = 0.0254;
    pub const INCHES_PER_FOOT: f64 = 12.0;
}

/// Conventional "none of the above" sentinel for checklist groups
pub const NONE_OF_THE_ABOVE: &str = "none";
