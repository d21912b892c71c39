//! # Abandonment Telemetry
//!
//! Best-effort reports of how far a respondent got, keyed by an anonymous
//! session id. Nothing in this module can fail or block a flow.

pub mod emitter;
pub mod events;
pub mod session;
pub mod transport;

pub use emitter::TelemetryEmitter;
pub use events::{TelemetryEvent, TelemetryKind};
pub use session::{
    FileSessionStorage, InMemorySessionStorage, SessionError, SessionManager, SessionStorage,
};
pub use transport::{
    BroadcastTelemetryTransport, HttpTelemetryTransport, TelemetryError, TelemetryTransport,
};
