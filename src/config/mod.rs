//! # Intake Configuration
//!
//! Runtime settings for the collaborators around a flow: where telemetry and
//! submissions are sent, how the session id is stored, and which system
//! fields the submission assembler fills in. Questionnaire content lives in
//! flow definitions, not here.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use intake_flow::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Defaults, then INTAKE_CONFIG_PATH, then INTAKE__SECTION__KEY overrides
//! let manager = ConfigManager::load()?;
//! let debounce = manager.config().telemetry.debounce();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::system;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Abandonment telemetry delivery
    pub telemetry: TelemetryConfig,

    /// Anonymous session id storage
    pub session: SessionConfig,

    /// Persistence API and submission system fields
    pub submission: SubmissionConfig,

    /// File upload service
    pub uploads: UploadsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Abandonment endpoint; events stay in-process when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    /// Identity edits on one segment inside this window are coalesced
    pub debounce_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            timeout_ms: system::DEFAULT_HTTP_TIMEOUT_MS,
            debounce_ms: system::DEFAULT_TELEMETRY_DEBOUNCE_MS,
        }
    }
}

impl TelemetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub storage_key: String,
    /// Directory for file-backed session storage; in-memory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: system::SESSION_STORAGE_KEY.to_string(),
            storage_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Persistence API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    pub id_field: String,
    pub status_field: String,
    pub default_status: String,
    pub timestamp_field: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: system::DEFAULT_HTTP_TIMEOUT_MS,
            id_field: system::DEFAULT_ID_FIELD.to_string(),
            status_field: system::DEFAULT_STATUS_FIELD.to_string(),
            default_status: system::DEFAULT_STATUS.to_string(),
            timestamp_field: system::DEFAULT_TIMESTAMP_FIELD.to_string(),
        }
    }
}

impl SubmissionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: system::DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

impl UploadsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl IntakeConfig {
    /// Validate values the type system cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        validate_endpoint("telemetry.endpoint", self.telemetry.endpoint.as_deref())?;
        validate_endpoint("submission.endpoint", self.submission.endpoint.as_deref())?;
        validate_endpoint("uploads.endpoint", self.uploads.endpoint.as_deref())?;

        for (field, timeout_ms) in [
            ("telemetry.timeout_ms", self.telemetry.timeout_ms),
            ("submission.timeout_ms", self.submission.timeout_ms),
            ("uploads.timeout_ms", self.uploads.timeout_ms),
        ] {
            if timeout_ms == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    "0",
                    "timeout must be greater than zero",
                ));
            }
        }

        for (field, value) in [
            ("session.storage_key", &self.session.storage_key),
            ("submission.id_field", &self.submission.id_field),
            ("submission.status_field", &self.submission.status_field),
            ("submission.timestamp_field", &self.submission.timestamp_field),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    field,
                    "intake configuration",
                ));
            }
        }

        Ok(())
    }
}

fn validate_endpoint(field: &str, endpoint: Option<&str>) -> ConfigResult<()> {
    match endpoint {
        Some(url) => Url::parse(url)
            .map(|_| ())
            .map_err(|e| ConfigurationError::invalid_value(field, url, e.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IntakeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.storage_key, "intake_session_id");
        assert_eq!(config.submission.id_field, "authid");
        assert_eq!(config.telemetry.debounce(), Duration::from_millis(1500));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut config = IntakeConfig::default();
        config.submission.endpoint = Some("not a url".to_string());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { ref field, .. } if field == "submission.endpoint"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = IntakeConfig::default();
        config.uploads.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: IntakeConfig =
            serde_json::from_value(serde_json::json!({"telemetry": {"enabled": false}})).unwrap();
        assert!(!config.telemetry.enabled);
        assert_eq!(config.telemetry.debounce_ms, 1500);
        assert_eq!(config.submission.default_status, "pending");
    }
}
