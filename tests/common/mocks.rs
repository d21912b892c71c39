//! Collaborator doubles

use async_trait::async_trait;
use intake_flow::collaborators::{
    CreateResponse, PersistenceApi, PersistenceError, UploadError, UploadFile, UploadService,
};
use intake_flow::submission::SubmissionPayload;
use parking_lot::Mutex;
use serde_json::Value;

/// Fails the first `failures` creates and records every payload it is handed
#[derive(Debug, Default)]
pub struct FlakyPersistence {
    failures: Mutex<usize>,
    seen: Mutex<Vec<SubmissionPayload>>,
}

impl FlakyPersistence {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: Mutex::new(failures),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<SubmissionPayload> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl PersistenceApi for FlakyPersistence {
    async fn create(&self, payload: &SubmissionPayload) -> Result<CreateResponse, PersistenceError> {
        self.seen.lock().push(payload.clone());
        let mut failures = self.failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(PersistenceError::Request("connection reset by peer".to_string()));
        }
        Ok(CreateResponse::created(payload.to_value()))
    }

    async fn read(&self, _id: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(None)
    }

    async fn update(&self, _id: &str, partial: &Value) -> Result<Value, PersistenceError> {
        Ok(partial.clone())
    }

    async fn delete(&self, _ids: &[String]) -> Result<usize, PersistenceError> {
        Ok(0)
    }
}

/// Upload service returning a fixed URL, or a fixed failure
#[derive(Debug)]
pub struct StubUploads {
    pub outcome: Result<String, UploadError>,
}

#[async_trait]
impl UploadService for StubUploads {
    async fn upload(&self, _file: UploadFile) -> Result<String, UploadError> {
        self.outcome.clone()
    }
}
