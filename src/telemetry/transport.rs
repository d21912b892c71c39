use super::events::TelemetryEvent;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Error types for telemetry delivery
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error("Telemetry transport misconfigured: {0}")]
    Configuration(String),
    #[error("Telemetry request failed: {0}")]
    Request(String),
    #[error("Telemetry endpoint rejected event with status {status}")]
    Rejected { status: u16 },
}

/// Delivery seam for abandonment telemetry
#[async_trait]
pub trait TelemetryTransport: Send + Sync + fmt::Debug {
    async fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;
}

/// JSON POST to the abandonment endpoint
#[derive(Clone)]
pub struct HttpTelemetryTransport {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl fmt::Debug for HttpTelemetryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTelemetryTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout_ms", &self.timeout.as_millis())
            .finish()
    }
}

impl HttpTelemetryTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TelemetryError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            TelemetryError::Configuration(format!("Invalid endpoint {endpoint}: {e}"))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("intake-flow/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                TelemetryError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }
}

#[async_trait]
impl TelemetryTransport for HttpTelemetryTransport {
    async fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(event)
            .send()
            .await
            .map_err(|e| TelemetryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(
            event = %event.kind,
            session_id = %event.session_id,
            segment_index = event.segment_index,
            "Telemetry event delivered"
        );
        Ok(())
    }
}

/// In-process telemetry fan-out
#[derive(Debug, Clone)]
pub struct BroadcastTelemetryTransport {
    sender: broadcast::Sender<TelemetryEvent>,
}

impl BroadcastTelemetryTransport {
    /// Create a new transport with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastTelemetryTransport {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl TelemetryTransport for BroadcastTelemetryTransport {
    async fn send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        // No subscribers is not a delivery failure
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}
