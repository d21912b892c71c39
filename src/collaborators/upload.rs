//! File upload service seam

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UploadError {
    #[error("Upload client misconfigured: {0}")]
    Configuration(String),
    #[error("Upload rejected: {0}")]
    Rejected(String),
    #[error("Upload request failed: {0}")]
    Request(String),
}

/// A file picked by the respondent for one upload field
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
pub trait UploadService: Send + Sync + fmt::Debug {
    /// Store the file and return its public URL
    async fn upload(&self, file: UploadFile) -> Result<String, UploadError>;
}

/// Multipart POST client; expects `{"url": "..."}` back
#[derive(Clone)]
pub struct HttpUploadClient {
    client: Client,
    endpoint: Url,
}

impl fmt::Debug for HttpUploadClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpUploadClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

impl HttpUploadClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, UploadError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| UploadError::Configuration(format!("Invalid endpoint {endpoint}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("intake-flow/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UploadError::Configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl UploadService for HttpUploadClient {
    async fn upload(&self, file: UploadFile) -> Result<String, UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::Rejected("file is empty".to_string()));
        }

        let size = file.bytes.len();
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| UploadError::Rejected(format!("Invalid content type: {e}")))?;
        let form = Form::new().part("file", part);

        debug!(file_name = %file.file_name, size = size, "Uploading file");

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected(format!("HTTP {status}")));
        }

        response
            .json::<UploadResponse>()
            .await
            .map(|body| body.url)
            .map_err(|e| UploadError::Request(format!("Invalid upload response: {e}")))
    }
}
