use super::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shape of a field, which fixes its type-appropriate default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Boolean,
    MultiSelect,
    Object,
    Number,
}

impl FieldKind {
    /// Value returned by `get_field` before the field is set
    pub fn default_value(&self) -> FieldValue {
        match self {
            Self::Text => FieldValue::Text(String::new()),
            Self::Boolean => FieldValue::Bool(false),
            Self::MultiSelect => FieldValue::List(Vec::new()),
            Self::Object => FieldValue::Object(BTreeMap::new()),
            Self::Number => FieldValue::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub kind: FieldKind,
    /// "None of the above" option for multi-select groups
    #[serde(default)]
    pub sentinel: Option<String>,
}

impl FieldDef {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            sentinel: None,
        }
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = Some(sentinel.into());
        self
    }
}

/// Every field a flow may hold, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema {
    fields: BTreeMap<String, FieldDef>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, def: FieldDef) {
        self.fields.insert(name.into(), def);
    }

    pub fn with(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.insert(name, def);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
