//! Persistence API seam
//!
//! The flow only depends on `create` reporting success and, on success,
//! returning enough of the stored record to resume or display it.

use crate::submission::SubmissionPayload;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistenceError {
    #[error("Persistence client misconfigured: {0}")]
    Configuration(String),
    #[error("Persistence request failed: {0}")]
    Request(String),
    #[error("Persistence API returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid persistence response: {0}")]
    InvalidResponse(String),
}

/// Result envelope of `create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CreateResponse {
    pub fn created(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait PersistenceApi: Send + Sync + fmt::Debug {
    async fn create(&self, payload: &SubmissionPayload) -> Result<CreateResponse, PersistenceError>;

    /// Fetch one record by id; `None` when absent
    async fn read(&self, id: &str) -> Result<Option<Value>, PersistenceError>;

    async fn update(&self, id: &str, partial: &Value) -> Result<Value, PersistenceError>;

    /// Delete records, returning how many were removed
    async fn delete(&self, ids: &[String]) -> Result<usize, PersistenceError>;
}

/// REST client for a record collection endpoint
///
/// `create` posts to the collection, `read`/`update` address
/// `{endpoint}/{id}`, and `delete` sends the ids in the request body.
#[derive(Clone)]
pub struct HttpPersistenceClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl fmt::Debug for HttpPersistenceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPersistenceClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout_ms", &self.timeout.as_millis())
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    deleted: usize,
}

impl HttpPersistenceClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PersistenceError> {
        let endpoint = Url::parse(endpoint.trim_end_matches('/')).map_err(|e| {
            PersistenceError::Configuration(format!("Invalid endpoint {endpoint}: {e}"))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("intake-flow/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                PersistenceError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        info!(endpoint = %endpoint, timeout_ms = timeout.as_millis() as u64, "Created persistence client");

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    fn record_url(&self, id: &str) -> Result<Url, PersistenceError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| PersistenceError::Configuration("Endpoint cannot be a base".to_string()))?
            .push(id);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PersistenceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(PersistenceError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn request_error(error: reqwest::Error) -> PersistenceError {
    PersistenceError::Request(error.to_string())
}

fn response_error(error: reqwest::Error) -> PersistenceError {
    PersistenceError::InvalidResponse(error.to_string())
}

#[async_trait]
impl PersistenceApi for HttpPersistenceClient {
    async fn create(&self, payload: &SubmissionPayload) -> Result<CreateResponse, PersistenceError> {
        debug!(url = %self.endpoint, fields = payload.len(), "Creating intake record");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(payload)
            .send()
            .await
            .map_err(request_error)?;
        Self::check(response)
            .await?
            .json::<CreateResponse>()
            .await
            .map_err(response_error)
    }

    async fn read(&self, id: &str) -> Result<Option<Value>, PersistenceError> {
        let response = self
            .client
            .get(self.record_url(id)?)
            .send()
            .await
            .map_err(request_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check(response)
            .await?
            .json::<Value>()
            .await
            .map(Some)
            .map_err(response_error)
    }

    async fn update(&self, id: &str, partial: &Value) -> Result<Value, PersistenceError> {
        let response = self
            .client
            .patch(self.record_url(id)?)
            .json(partial)
            .send()
            .await
            .map_err(request_error)?;
        Self::check(response)
            .await?
            .json::<Value>()
            .await
            .map_err(response_error)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, PersistenceError> {
        let response = self
            .client
            .delete(self.endpoint.clone())
            .json(&DeleteRequest { ids })
            .send()
            .await
            .map_err(request_error)?;
        Self::check(response)
            .await?
            .json::<DeleteResponse>()
            .await
            .map(|body| body.deleted)
            .map_err(response_error)
    }
}

/// Process-local record store keyed by the payload's id field
#[derive(Debug)]
pub struct InMemoryPersistence {
    id_field: String,
    records: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryPersistence {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            records: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl PersistenceApi for InMemoryPersistence {
    async fn create(&self, payload: &SubmissionPayload) -> Result<CreateResponse, PersistenceError> {
        let id = payload
            .str_field(&self.id_field)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut records = self.records.lock();
        if records.contains_key(&id) {
            return Ok(CreateResponse::failed(format!("Record {id} already exists")));
        }
        let record = payload.to_value();
        records.insert(id, record.clone());
        Ok(CreateResponse::created(record))
    }

    async fn read(&self, id: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self.records.lock().get(id).cloned())
    }

    async fn update(&self, id: &str, partial: &Value) -> Result<Value, PersistenceError> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(id)
            .ok_or_else(|| PersistenceError::Rejected {
                status: 404,
                body: format!("Record {id} not found"),
            })?;
        if let (Value::Object(target), Value::Object(changes)) = (&mut *record, partial) {
            for (key, value) in changes {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(record.clone())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, PersistenceError> {
        let mut records = self.records.lock();
        Ok(ids.iter().filter(|id| records.remove(*id).is_some()).count())
    }
}
