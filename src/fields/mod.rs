//! Field store: current answers, per-field validation errors and the schema
//! that fixes each field's type-appropriate default.

pub mod schema;
pub mod store;
pub mod value;

pub use schema::{FieldDef, FieldKind, FieldSchema};
pub use store::{FieldChange, FieldStore};
pub use value::FieldValue;
