//! Anonymous session id storage
//!
//! The session id keys every telemetry event of one respondent. It is created
//! on flow start when absent and removed once a terminal event is reported.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Session storage I/O failed for key {key}: {reason}")]
    Io { key: String, reason: String },
    #[error("Invalid session storage key: {0}")]
    InvalidKey(String),
}

impl From<SessionError> for crate::error::IntakeError {
    fn from(error: SessionError) -> Self {
        crate::error::IntakeError::Session(error.to_string())
    }
}

/// Client-scoped key-value store holding the session id
pub trait SessionStorage: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn delete(&self, key: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for InMemorySessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// One file per key under a directory
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    directory: PathBuf,
}

impl FileSessionStorage {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SessionError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(SessionError::InvalidKey(key.to_string()));
        }
        Ok(self.directory.join(key))
    }
}

fn io_error(key: &str, error: std::io::Error) -> SessionError {
    SessionError::Io {
        key: key.to_string(),
        reason: error.to_string(),
    }
}

impl SessionStorage for FileSessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.directory).map_err(|e| io_error(key, e))?;
        fs::write(&path, value).map_err(|e| io_error(key, e))
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key, e)),
        }
    }
}

/// Create-if-absent access to the session id under one storage key
#[derive(Debug, Clone)]
pub struct SessionManager {
    storage: Arc<dyn SessionStorage>,
    key: String,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn SessionStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Return the stored session id, generating and persisting one if absent
    pub fn ensure_session(&self) -> Result<String, SessionError> {
        if let Some(existing) = self.current()? {
            return Ok(existing);
        }

        let session_id = Uuid::new_v4().to_string();
        self.storage.set(&self.key, &session_id)?;
        debug!(session_id = %session_id, key = %self.key, "Created intake session");
        Ok(session_id)
    }

    pub fn current(&self) -> Result<Option<String>, SessionError> {
        Ok(self
            .storage
            .get(&self.key)?
            .filter(|session_id| !session_id.is_empty()))
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.storage.delete(&self.key)
    }
}
