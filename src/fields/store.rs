use super::schema::{FieldKind, FieldSchema};
use super::value::FieldValue;
use crate::constants::system::FIELD_CHANGE_CHANNEL_CAPACITY;
use crate::error::{IntakeError, Result};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::trace;

/// Notification sent to views whenever a field changes
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub name: String,
    pub value: Option<FieldValue>,
}

/// Single owned store of answers and their validation errors
///
/// Views subscribe through [`FieldStore::subscribe`] rather than holding
/// private copies of the values.
#[derive(Debug)]
pub struct FieldStore {
    schema: FieldSchema,
    values: BTreeMap<String, FieldValue>,
    errors: BTreeMap<String, String>,
    changes: broadcast::Sender<FieldChange>,
}

impl FieldStore {
    pub fn new(schema: FieldSchema) -> Self {
        let (changes, _) = broadcast::channel(FIELD_CHANGE_CHANNEL_CAPACITY);
        Self {
            schema,
            values: BTreeMap::new(),
            errors: BTreeMap::new(),
            changes,
        }
    }

    /// Rebuild a store from previously captured values
    pub fn with_values(schema: FieldSchema, values: BTreeMap<String, FieldValue>) -> Result<Self> {
        let mut store = Self::new(schema);
        for (name, value) in values {
            store.set_field(&name, value)?;
        }
        Ok(store)
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Store a value, clearing the field's error once it holds an answer
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<()> {
        self.ensure_known(name)?;

        if !value.is_empty() {
            self.errors.remove(name);
        }

        trace!(field = name, value = %value, "Field updated");
        self.values.insert(name.to_string(), value.clone());
        self.notify(name, Some(value));
        Ok(())
    }

    /// Current value, or the kind's default when unset
    pub fn get_field(&self, name: &str) -> FieldValue {
        match self.values.get(name) {
            Some(value) => value.clone(),
            None => self
                .schema
                .get(name)
                .map(|def| def.kind.default_value())
                .unwrap_or_default(),
        }
    }

    /// Toggle one item of a multi-select group
    ///
    /// Including the group's sentinel leaves exactly `[sentinel]`; including
    /// any other item drops the sentinel first.
    pub fn set_array_field(&mut self, name: &str, item: &str, included: bool) -> Result<()> {
        self.ensure_known(name)?;
        let sentinel = self
            .schema
            .get(name)
            .and_then(|def| def.sentinel.clone());

        let mut items = match self.get_field(name) {
            FieldValue::List(items) => items,
            _ => Vec::new(),
        };

        if included {
            if sentinel.as_deref() == Some(item) {
                items = vec![item.to_string()];
            } else {
                if let Some(sentinel) = &sentinel {
                    items.retain(|existing| existing != sentinel);
                }
                if !items.iter().any(|existing| existing == item) {
                    items.push(item.to_string());
                }
            }
        } else {
            items.retain(|existing| existing != item);
        }

        self.set_field(name, FieldValue::List(items))
    }

    /// Forget a value entirely, so `get_field` falls back to the default
    pub fn clear_field(&mut self, name: &str) -> Result<()> {
        self.ensure_known(name)?;
        if self.values.remove(name).is_some() {
            self.notify(name, None);
        }
        Ok(())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<FieldKind> {
        self.schema.get(name).map(|def| def.kind)
    }

    pub fn sentinel(&self, name: &str) -> Option<&str> {
        self.schema.get(name).and_then(|def| def.sentinel.as_deref())
    }

    /// Snapshot of the fields that have been set
    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    pub fn set_error(&mut self, name: &str, message: impl Into<String>) {
        self.errors.insert(name.to_string(), message.into());
    }

    pub fn clear_error(&mut self, name: &str) {
        self.errors.remove(name);
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(String::as_str)
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FieldChange> {
        self.changes.subscribe()
    }

    fn ensure_known(&self, name: &str) -> Result<()> {
        if self.schema.contains(name) {
            Ok(())
        } else {
            Err(IntakeError::UnknownField(name.to_string()))
        }
    }

    fn notify(&self, name: &str, value: Option<FieldValue>) {
        // No subscribers is fine
        let _ = self.changes.send(FieldChange {
            name: name.to_string(),
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::schema::FieldDef;

    fn store() -> FieldStore {
        let schema = FieldSchema::new()
            .with("first_name", FieldDef::new(FieldKind::Text))
            .with("smoker", FieldDef::new(FieldKind::Boolean))
            .with(
                "conditions",
                FieldDef::new(FieldKind::MultiSelect).with_sentinel("none"),
            );
        FieldStore::new(schema)
    }

    #[test]
    fn test_defaults_for_unset_fields() {
        let store = store();
        assert_eq!(store.get_field("first_name"), FieldValue::text(""));
        assert_eq!(store.get_field("smoker"), FieldValue::Bool(false));
        assert_eq!(store.get_field("conditions"), FieldValue::List(vec![]));
        assert!(!store.is_set("first_name"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut store = store();
        let err = store.set_field("nope", FieldValue::text("x")).unwrap_err();
        assert_eq!(err, IntakeError::UnknownField("nope".to_string()));
    }

    #[test]
    fn test_error_cleared_only_by_non_empty_value() {
        let mut store = store();
        store.set_error("first_name", "Required");

        store.set_field("first_name", FieldValue::text("")).unwrap();
        assert_eq!(store.error("first_name"), Some("Required"));

        store.set_field("first_name", FieldValue::text("Ada")).unwrap();
        assert_eq!(store.error("first_name"), None);
    }

    #[test]
    fn test_sentinel_clears_other_selections() {
        let mut store = store();
        store.set_array_field("conditions", "diabetes", true).unwrap();
        store.set_array_field("conditions", "asthma", true).unwrap();
        store.set_array_field("conditions", "none", true).unwrap();

        assert_eq!(store.get_field("conditions"), FieldValue::list(["none"]));
    }

    #[test]
    fn test_non_sentinel_removes_sentinel() {
        let mut store = store();
        store.set_array_field("conditions", "none", true).unwrap();
        store.set_array_field("conditions", "asthma", true).unwrap();

        assert_eq!(store.get_field("conditions"), FieldValue::list(["asthma"]));
    }

    #[test]
    fn test_array_toggle_without_duplicates() {
        let mut store = store();
        store.set_array_field("conditions", "asthma", true).unwrap();
        store.set_array_field("conditions", "asthma", true).unwrap();
        store.set_array_field("conditions", "gout", true).unwrap();
        store.set_array_field("conditions", "asthma", false).unwrap();

        assert_eq!(store.get_field("conditions"), FieldValue::list(["gout"]));
    }

    #[test]
    fn test_clear_field_restores_default() {
        let mut store = store();
        store.set_field("smoker", FieldValue::Bool(true)).unwrap();
        store.clear_field("smoker").unwrap();
        assert!(!store.is_set("smoker"));
        assert_eq!(store.get_field("smoker"), FieldValue::Bool(false));
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let mut store = store();
        let mut rx = store.subscribe();

        store.set_field("first_name", FieldValue::text("Ada")).unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.name, "first_name");
        assert_eq!(change.value, Some(FieldValue::text("Ada")));
    }
}
