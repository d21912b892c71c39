use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Write-once submission snapshot
///
/// Clones share one allocation, so a retried submit hands the persistence
/// API the very same payload that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPayload {
    fields: Arc<Map<String, Value>>,
}

impl SubmissionPayload {
    pub(crate) fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields: Arc::new(fields),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// String value of `key`, typically the generated record identifier
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.as_ref().clone())
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self.fields.as_ref())
    }

    /// True when both handles point at the same snapshot
    pub fn same_instance(&self, other: &SubmissionPayload) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl Serialize for SubmissionPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
