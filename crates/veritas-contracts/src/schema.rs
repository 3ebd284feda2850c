//! Endpoint schema types.
//!
//! An `EndpointSchema` describes one logical table (`nb.devices`, ...): the
//! fields a query may select, with their nested relation shapes, and the
//! filters a query may use. Schemas are deserialized from TOML by the
//! registry and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// The value shape of a field or filter.
///
/// Expressed in TOML as a kebab-case string:
/// ```toml
/// kind = "scalar"
/// kind = "prefix"
/// kind = "list"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    #[default]
    Scalar,
    Integer,
    Boolean,
    /// A CIDR network such as `192.168.0.0/24`.
    Prefix,
    /// A host address, optionally with a mask length.
    Address,
    /// A to-one relation; children describe the related object.
    Relation,
    /// A to-many relation; children describe each element.
    List,
}

impl FieldKind {
    pub fn is_nested(&self) -> bool {
        matches!(self, FieldKind::Relation | FieldKind::List)
    }

    /// Whether `__ic` (case-insensitive contains) is meaningful.
    pub fn supports_contains(&self) -> bool {
        matches!(self, FieldKind::Scalar | FieldKind::Prefix | FieldKind::Address)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Prefix => "prefix",
            FieldKind::Address => "address",
            FieldKind::Relation => "relation",
            FieldKind::List => "list",
        };
        f.write_str(s)
    }
}

/// A selectable field and, for relations, its nested shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    /// Name of the underlying attribute when `name` is an alias
    /// (e.g. `hostname` is served by `name`).
    #[serde(default)]
    pub source: Option<String>,
    /// Children of a relation or list. Empty means the shape is open.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl FieldDef {
    pub fn child(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True when the relation declares no children, so any deeper path is accepted.
    pub fn is_open(&self) -> bool {
        self.kind.is_nested() && self.fields.is_empty()
    }
}

/// How the source of truth interprets a plain `=` on a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterLookup {
    /// The record value must equal the filter value.
    #[default]
    Exact,
    /// The record value must lie within the network given as filter value.
    Within,
}

/// A filter the source of truth accepts on an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDef {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    /// Dotted record path the filter is evaluated against. Defaults to `name`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub lookup: FilterLookup,
}

impl FilterDef {
    pub fn record_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }
}

/// Filters applied to the elements of a nested list relation rather than
/// to the records of the endpoint itself.
///
/// A filter field starting with `prefix` names one of `filters` (or, with
/// `custom_fields`, a `cf_` custom field) on the elements of `relation`:
/// `pip4for_cf_net=testnet` keeps the `primary_ip4_for` devices whose `net`
/// custom field is `testnet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationFilterDef {
    pub prefix: String,
    pub relation: String,
    /// Whether the related objects carry a `custom_field_data` bag.
    #[serde(default)]
    pub custom_fields: bool,
    #[serde(default)]
    pub filters: Vec<FilterDef>,
}

impl RelationFilterDef {
    pub fn filter(&self, name: &str) -> Option<&FilterDef> {
        self.filters.iter().find(|f| f.name == name)
    }
}

/// One logical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSchema {
    /// Logical name, e.g. `nb.devices`.
    pub name: String,
    /// GraphQL root field, e.g. `devices`. Empty for endpoints that select
    /// several roots at once (`nb.general`).
    #[serde(default)]
    pub root: String,
    /// Whether records carry a `custom_field_data` bag.
    #[serde(default)]
    pub custom_fields: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub filters: Vec<FilterDef>,
    #[serde(default)]
    pub relation_filters: Vec<RelationFilterDef>,
}

impl EndpointSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn filter(&self, name: &str) -> Option<&FilterDef> {
        self.filters.iter().find(|f| f.name == name)
    }

    /// The relation filter set whose prefix `field` starts with.
    pub fn relation_filter(&self, field: &str) -> Option<&RelationFilterDef> {
        self.relation_filters
            .iter()
            .find(|r| field.len() > r.prefix.len() && field.starts_with(&r.prefix))
    }

    /// The table part of the logical name (`nb.devices` -> `devices`).
    pub fn table(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// The type of a custom field, as the source of truth reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CustomFieldType {
    Text,
    Select,
    MultiSelect,
    Boolean,
    Integer,
}

/// A custom field declared in the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
}

impl CustomFieldDef {
    pub fn new(name: impl Into<String>, field_type: CustomFieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Custom fields expressed as the equivalent field kind.
    pub fn kind(&self) -> FieldKind {
        match self.field_type {
            CustomFieldType::Boolean => FieldKind::Boolean,
            CustomFieldType::Integer => FieldKind::Integer,
            CustomFieldType::Text | CustomFieldType::Select | CustomFieldType::MultiSelect => {
                FieldKind::Scalar
            }
        }
    }
}
