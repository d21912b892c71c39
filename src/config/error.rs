//! Errors raised while loading or validating [`IntakeConfig`](super::IntakeConfig)

use crate::error::IntakeError;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Cannot read intake config '{file_path}': {error}")]
    FileReadError { file_path: String, error: String },

    /// Sources merged but did not deserialize into the config shape
    #[error("Cannot parse intake config from {source_name}: {reason}")]
    ParseError { source_name: String, reason: String },

    #[error("Intake config field '{field}' must be set ({context})")]
    MissingRequiredField { field: String, context: String },

    #[error("Intake config field '{field}' has invalid value '{value}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    pub fn file_read_error(file_path: impl Into<String>, error: impl Display) -> Self {
        Self::FileReadError {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }

    pub fn parse_error(source_name: impl Into<String>, error: impl Display) -> Self {
        Self::ParseError {
            source_name: source_name.into(),
            reason: error.to_string(),
        }
    }

    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

impl From<ConfigurationError> for IntakeError {
    fn from(error: ConfigurationError) -> Self {
        IntakeError::Configuration(error.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
