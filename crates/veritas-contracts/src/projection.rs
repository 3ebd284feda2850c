//! Projection types: the resolved form of a `select(...)` field list.

use serde::{Deserialize, Serialize};

/// Prefix that marks a custom-field reference in a field list or filter.
pub const CUSTOM_FIELD_PREFIX: &str = "cf_";

/// Key under which custom fields surface in result records.
///
/// `cf_net` in a projection surfaces as `custom_field_data: {net: ...}`,
/// never as a bare `net` key.
pub const CUSTOM_FIELD_DATA: &str = "custom_field_data";

/// Attribute the source of truth stores the custom-field bag under.
pub const CUSTOM_FIELD_SOURCE: &str = "_custom_field_data";

/// What a single selected field refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRef {
    /// A top-level field, e.g. `hostname`.
    Plain(String),
    /// A dotted path into nested relations, e.g. `platform.name`.
    Path(Vec<String>),
    /// A custom field, e.g. `cf_net` -> `Custom("net")`.
    Custom(String),
}

/// One selected field after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// The field as the caller wrote it, without any join alias qualifier.
    pub raw: String,
    pub field: FieldRef,
}

impl FieldSpec {
    pub fn new(raw: impl Into<String>, field: FieldRef) -> Self {
        Self {
            raw: raw.into(),
            field,
        }
    }

    /// The key this field occupies in a result record.
    pub fn output_key(&self) -> &str {
        match &self.field {
            FieldRef::Plain(name) => name,
            FieldRef::Path(segments) => segments.first().map(String::as_str).unwrap_or_default(),
            FieldRef::Custom(_) => CUSTOM_FIELD_DATA,
        }
    }

    /// The dotted path the source of truth must return for this field.
    pub fn fetch_path(&self) -> String {
        match &self.field {
            FieldRef::Plain(name) => name.clone(),
            FieldRef::Path(segments) => segments.join("."),
            FieldRef::Custom(name) => format!("{CUSTOM_FIELD_DATA}.{name}"),
        }
    }
}

/// The ordered set of output fields for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    pub fields: Vec<FieldSpec>,
}

impl ProjectionSpec {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Output keys in first-appearance order, without duplicates.
    pub fn output_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for spec in &self.fields {
            let key = spec.output_key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.output_key() == key)
    }
}
