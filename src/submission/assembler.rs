use super::payload::SubmissionPayload;
use crate::config::SubmissionConfig;
use crate::fields::FieldValue;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Fields the receiving schema rejects when sent as `""`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizationRules {
    /// Top-level enum-typed fields dropped when empty
    pub optional_enum_fields: Vec<String>,
    /// Object field name to sub-fields dropped when empty
    pub nested_objects: BTreeMap<String, Vec<String>>,
}

impl SanitizationRules {
    pub fn optional_enum(mut self, field: impl Into<String>) -> Self {
        self.optional_enum_fields.push(field.into());
        self
    }

    pub fn nested<I, S>(mut self, object: impl Into<String>, sub_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nested_objects
            .entry(object.into())
            .or_default()
            .extend(sub_fields.into_iter().map(Into::into));
        self
    }

    /// Every field name the rules refer to
    pub fn referenced_fields(&self) -> impl Iterator<Item = &str> {
        self.optional_enum_fields
            .iter()
            .map(String::as_str)
            .chain(self.nested_objects.keys().map(String::as_str))
    }

    fn apply(&self, fields: &mut Map<String, Value>) {
        for field in &self.optional_enum_fields {
            if is_blank(fields.get(field)) {
                fields.remove(field);
            }
        }

        for (object, sub_fields) in &self.nested_objects {
            if let Some(Value::Object(inner)) = fields.get_mut(object) {
                for sub_field in sub_fields {
                    if is_blank(inner.get(sub_field)) {
                        inner.remove(sub_field);
                    }
                }
            }
        }
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if s.is_empty())
}

/// System fields attached after answers and derived values
#[derive(Debug, Clone, PartialEq)]
pub struct SystemDefaults {
    pub id_field: String,
    pub status_field: String,
    pub default_status: String,
    pub timestamp_field: String,
    /// Additional constant fields, applied last
    pub extra: BTreeMap<String, Value>,
}

impl SystemDefaults {
    pub fn from_config(config: &SubmissionConfig) -> Self {
        Self {
            id_field: config.id_field.clone(),
            status_field: config.status_field.clone(),
            default_status: config.default_status.clone(),
            timestamp_field: config.timestamp_field.clone(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl Default for SystemDefaults {
    fn default() -> Self {
        Self::from_config(&SubmissionConfig::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionAssembler {
    sanitization: SanitizationRules,
}

impl SubmissionAssembler {
    pub fn new(sanitization: SanitizationRules) -> Self {
        Self { sanitization }
    }

    pub fn sanitization(&self) -> &SanitizationRules {
        &self.sanitization
    }

    pub fn assemble(
        &self,
        values: &BTreeMap<String, FieldValue>,
        derived: &BTreeMap<String, FieldValue>,
        defaults: &SystemDefaults,
    ) -> SubmissionPayload {
        self.assemble_at(values, derived, defaults, Utc::now())
    }

    /// Merge answers, then derived values, then system defaults
    pub fn assemble_at(
        &self,
        values: &BTreeMap<String, FieldValue>,
        derived: &BTreeMap<String, FieldValue>,
        defaults: &SystemDefaults,
        now: DateTime<Utc>,
    ) -> SubmissionPayload {
        let mut fields = Map::new();

        for (name, value) in values.iter().chain(derived.iter()) {
            if matches!(value, FieldValue::Empty) {
                fields.remove(name);
            } else {
                fields.insert(name.clone(), value.to_json());
            }
        }

        let has_id = fields
            .get(&defaults.id_field)
            .and_then(Value::as_str)
            .is_some_and(|id| !id.is_empty());
        if !has_id {
            fields.insert(
                defaults.id_field.clone(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
        fields.insert(
            defaults.status_field.clone(),
            Value::String(defaults.default_status.clone()),
        );
        fields.insert(
            defaults.timestamp_field.clone(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        for (key, value) in &defaults.extra {
            fields.insert(key.clone(), value.clone());
        }

        self.sanitization.apply(&mut fields);

        debug!(
            field_count = fields.len(),
            generated_id = !has_id,
            "Assembled submission payload"
        );

        SubmissionPayload::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, FieldValue)]) -> BTreeMap<String, FieldValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_merge_order_and_system_fields() {
        let assembler = SubmissionAssembler::default();
        let payload = assembler.assemble(
            &values(&[
                ("first_name", FieldValue::text("Ada")),
                ("bmi", FieldValue::text("stale")),
                ("status", FieldValue::text("user-typed")),
            ]),
            &values(&[("bmi", FieldValue::Number(25.8))]),
            &SystemDefaults::default(),
        );

        assert_eq!(payload.get("first_name"), Some(&json!("Ada")));
        assert_eq!(payload.get("bmi"), Some(&json!(25.8)));
        assert_eq!(payload.str_field("status"), Some("pending"));
        assert!(Uuid::parse_str(payload.str_field("authid").unwrap()).is_ok());
        assert!(payload.contains_key("submitted_at"));
    }

    #[test]
    fn test_existing_id_is_kept() {
        let payload = SubmissionAssembler::default().assemble(
            &values(&[("authid", FieldValue::text("existing"))]),
            &BTreeMap::new(),
            &SystemDefaults::default(),
        );
        assert_eq!(payload.str_field("authid"), Some("existing"));
    }

    #[test]
    fn test_sanitization_strips_empty_enums() {
        let assembler = SubmissionAssembler::new(
            SanitizationRules::default()
                .optional_enum("sex_at_birth")
                .optional_enum("ethnicity")
                .nested("shipping", ["state", "unit"]),
        );
        let mut shipping = BTreeMap::new();
        shipping.insert("state".to_string(), FieldValue::text(""));
        shipping.insert("unit".to_string(), FieldValue::text("4B"));
        shipping.insert("street".to_string(), FieldValue::text(""));

        let payload = assembler.assemble(
            &values(&[
                ("sex_at_birth", FieldValue::text("")),
                ("ethnicity", FieldValue::text("prefer_not")),
                ("notes", FieldValue::text("")),
                ("shipping", FieldValue::Object(shipping)),
            ]),
            &BTreeMap::new(),
            &SystemDefaults::default(),
        );

        assert!(!payload.contains_key("sex_at_birth"));
        assert_eq!(payload.str_field("ethnicity"), Some("prefer_not"));
        // Only configured fields are stripped
        assert_eq!(payload.str_field("notes"), Some(""));
        assert_eq!(
            payload.get("shipping"),
            Some(&json!({"unit": "4B", "street": ""}))
        );
    }

    #[test]
    fn test_unset_and_empty_values_absent() {
        let payload = SubmissionAssembler::default().assemble(
            &values(&[("weight", FieldValue::Empty)]),
            &BTreeMap::new(),
            &SystemDefaults::default().with_extra("source", "web"),
        );
        assert!(!payload.contains_key("weight"));
        assert!(!payload.contains_key("height"));
        assert_eq!(payload.str_field("source"), Some("web"));
    }
}
