use super::events::{TelemetryEvent, TelemetryKind};
use super::session::{SessionError, SessionManager};
use super::transport::{
    BroadcastTelemetryTransport, HttpTelemetryTransport, TelemetryError, TelemetryTransport,
};
use crate::config::TelemetryConfig;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type ReportKey = (String, usize, BTreeMap<String, String>);

#[derive(Debug, Default)]
struct DedupeState {
    sent: HashSet<ReportKey>,
    last_sent_at: HashMap<(String, usize), Instant>,
}

/// Fire-and-forget abandonment telemetry with a single failure policy:
/// delivery errors are logged and dropped, never returned to the flow.
#[derive(Debug)]
pub struct TelemetryEmitter {
    transport: Option<Arc<dyn TelemetryTransport>>,
    session: SessionManager,
    debounce: Duration,
    state: Mutex<DedupeState>,
}

impl TelemetryEmitter {
    pub fn new(
        transport: Arc<dyn TelemetryTransport>,
        session: SessionManager,
        debounce: Duration,
    ) -> Self {
        Self {
            transport: Some(transport),
            session,
            debounce,
            state: Mutex::new(DedupeState::default()),
        }
    }

    /// Emitter that keeps the session lifecycle but sends nothing
    pub fn disabled(session: SessionManager) -> Self {
        Self {
            transport: None,
            session,
            debounce: Duration::ZERO,
            state: Mutex::new(DedupeState::default()),
        }
    }

    /// HTTP when an endpoint is configured, in-process broadcast otherwise
    pub fn from_config(
        config: &TelemetryConfig,
        session: SessionManager,
    ) -> Result<Self, TelemetryError> {
        if !config.enabled {
            return Ok(Self::disabled(session));
        }

        let transport: Arc<dyn TelemetryTransport> = match &config.endpoint {
            Some(endpoint) => Arc::new(HttpTelemetryTransport::new(endpoint, config.timeout())?),
            None => Arc::new(BroadcastTelemetryTransport::default()),
        };
        Ok(Self::new(transport, session, config.debounce()))
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn ensure_session(&self) -> Result<String, SessionError> {
        self.session.ensure_session()
    }

    /// Report an event without waiting for delivery
    ///
    /// Returns the delivery task when one was spawned. Duplicates, debounced
    /// identity edits and reports made outside a tokio runtime return `None`.
    /// Terminal kinds delete the session id after the event is handed off.
    pub fn report(&self, event: TelemetryEvent) -> Option<JoinHandle<()>> {
        let handle = if self.should_send(&event) {
            self.spawn_delivery(event.clone())
        } else {
            debug!(
                event = %event.kind,
                session_id = %event.session_id,
                segment_index = event.segment_index,
                "Suppressed duplicate telemetry event"
            );
            None
        };

        if event.kind.is_terminal() {
            self.end_session();
        }

        handle
    }

    fn should_send(&self, event: &TelemetryEvent) -> bool {
        if event.kind != TelemetryKind::SegmentReached {
            return true;
        }

        let mut state = self.state.lock();
        let key = (
            event.session_id.clone(),
            event.segment_index,
            event.identity.clone(),
        );
        if state.sent.contains(&key) {
            return false;
        }

        let now = Instant::now();
        let position = (event.session_id.clone(), event.segment_index);
        if let Some(previous) = state.last_sent_at.get(&position) {
            if now.duration_since(*previous) < self.debounce {
                return false;
            }
        }

        state.sent.insert(key);
        state.last_sent_at.insert(position, now);
        true
    }

    fn spawn_delivery(&self, event: TelemetryEvent) -> Option<JoinHandle<()>> {
        let transport = Arc::clone(self.transport.as_ref()?);
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(event = %event.kind, "No async runtime available, dropping telemetry event");
                return None;
            }
        };

        Some(runtime.spawn(async move {
            if let Err(e) = transport.send(&event).await {
                warn!(
                    error = %e,
                    event = %event.kind,
                    session_id = %event.session_id,
                    segment_id = %event.segment_id,
                    "Telemetry delivery failed"
                );
            }
        }))
    }

    fn end_session(&self) {
        {
            let mut state = self.state.lock();
            state.sent.clear();
            state.last_sent_at.clear();
        }
        if let Err(e) = self.session.clear() {
            warn!(error = %e, key = self.session.key(), "Failed to clear intake session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::SegmentId;
    use crate::telemetry::session::InMemorySessionStorage;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct FailingTransport;

    #[async_trait]
    impl TelemetryTransport for FailingTransport {
        async fn send(&self, _event: &TelemetryEvent) -> Result<(), TelemetryError> {
            Err(TelemetryError::Rejected { status: 503 })
        }
    }

    fn session() -> SessionManager {
        SessionManager::new(Arc::new(InMemorySessionStorage::new()), "sid")
    }

    fn reached(index: usize, identity: &[(&str, &str)]) -> TelemetryEvent {
        TelemetryEvent::new(
            TelemetryKind::SegmentReached,
            "session-1",
            index,
            SegmentId::new(format!("segment-{index}")),
            identity
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_identical_tuple_sent_once() {
        let transport = Arc::new(BroadcastTelemetryTransport::default());
        let mut receiver = transport.subscribe();
        let emitter = TelemetryEmitter::new(transport, session(), Duration::ZERO);

        emitter.report(reached(1, &[])).unwrap().await.unwrap();
        assert!(emitter.report(reached(1, &[])).is_none());
        emitter.report(reached(2, &[])).unwrap().await.unwrap();

        assert_eq!(receiver.recv().await.unwrap().segment_index, 1);
        assert_eq!(receiver.recv().await.unwrap().segment_index, 2);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_identity_edits_debounced_on_same_segment() {
        let transport = Arc::new(BroadcastTelemetryTransport::default());
        let emitter = TelemetryEmitter::new(transport, session(), Duration::from_secs(60));

        assert!(emitter.report(reached(1, &[("email", "a@")])).is_some());
        assert!(emitter.report(reached(1, &[("email", "a@b")])).is_none());
        assert!(emitter.report(reached(2, &[("email", "a@b")])).is_some());
    }

    #[tokio::test]
    async fn test_delivery_failures_are_swallowed() {
        let emitter = TelemetryEmitter::new(Arc::new(FailingTransport), session(), Duration::ZERO);
        let handle = emitter.report(reached(0, &[])).unwrap();
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_terminal_event_clears_session() {
        let emitter = TelemetryEmitter::new(
            Arc::new(BroadcastTelemetryTransport::default()),
            session(),
            Duration::ZERO,
        );
        let session_id = emitter.ensure_session().unwrap();

        let mut event = reached(3, &[]);
        event.kind = TelemetryKind::Submitted;
        event.session_id = session_id;
        emitter.report(event).unwrap().await.unwrap();

        assert_eq!(emitter.session().current().unwrap(), None);
    }

    #[test]
    fn test_no_runtime_drops_event() {
        let emitter = TelemetryEmitter::new(
            Arc::new(BroadcastTelemetryTransport::default()),
            session(),
            Duration::ZERO,
        );
        assert!(emitter.report(reached(0, &[])).is_none());
    }

    #[test]
    fn test_disabled_from_config() {
        let config = TelemetryConfig {
            enabled: false,
            ..TelemetryConfig::default()
        };
        let emitter = TelemetryEmitter::from_config(&config, session()).unwrap();
        assert!(!emitter.is_enabled());
        assert!(emitter.report(reached(0, &[])).is_none());
    }
}
