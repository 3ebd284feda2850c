//! The query descriptor built by the fluent call chain.
//!
//! A `QueryDescriptor` holds the raw clauses exactly as the caller wrote
//! them. Every builder function takes the descriptor by value and returns a
//! new one, so a chain never shares mutable state with another chain.
//! Resolution against the schema happens later, in the planner.

use serde::{Deserialize, Serialize};

/// Unique identifier for a single query execution.
///
/// Every log line emitted while a query runs carries this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(pub uuid::Uuid);

impl QueryId {
    /// Create a new, unique query id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An ordered list of names given either as one comma-joined string or as an
/// explicit sequence.
///
/// Every entry is split on commas and trimmed; empty entries are dropped, so
/// `"id, hostname"` and `["id", "hostname"]` produce the same list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameList(pub Vec<String>);

impl NameList {
    fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = parts
            .into_iter()
            .flat_map(|part| {
                part.as_ref()
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .collect();
        Self(names)
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for NameList {
    fn from(s: &str) -> Self {
        Self::from_parts([s])
    }
}

impl From<String> for NameList {
    fn from(s: String) -> Self {
        Self::from_parts([s])
    }
}

impl From<Vec<&str>> for NameList {
    fn from(v: Vec<&str>) -> Self {
        Self::from_parts(v)
    }
}

impl From<Vec<String>> for NameList {
    fn from(v: Vec<String>) -> Self {
        Self::from_parts(v)
    }
}

impl From<&[&str]> for NameList {
    fn from(v: &[&str]) -> Self {
        Self::from_parts(v.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for NameList {
    fn from(v: [&str; N]) -> Self {
        Self::from_parts(v)
    }
}

/// The unresolved query assembled by `select / using / join / on / transform`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Selected fields in caller order.
    pub select: Vec<String>,
    /// `namespace.table[ as alias]` of the primary endpoint.
    pub using: Option<String>,
    /// `namespace.table[ as alias]` of the joined endpoint.
    pub join: Option<String>,
    /// Correlation expression `leftAlias.path = rightAlias.path`.
    pub on: Option<String>,
    /// Filter expression; `None` and `""` both mean "select all".
    pub filter: Option<String>,
    /// Named transforms applied in order after execution.
    pub transforms: Vec<String>,
    /// Maximum number of primary records the source of truth returns.
    pub limit: Option<usize>,
    /// Number of primary records the source of truth skips.
    pub offset: Option<usize>,
}

impl QueryDescriptor {
    pub fn new(select: impl Into<NameList>) -> Self {
        Self {
            select: select.into().into_inner(),
            ..Self::default()
        }
    }

    pub fn with_using(self, table: impl Into<String>) -> Self {
        Self {
            using: Some(table.into()),
            ..self
        }
    }

    pub fn with_join(self, table: impl Into<String>) -> Self {
        Self {
            join: Some(table.into()),
            ..self
        }
    }

    pub fn with_on(self, correlation: impl Into<String>) -> Self {
        Self {
            on: Some(correlation.into()),
            ..self
        }
    }

    pub fn with_filter(self, expression: impl Into<String>) -> Self {
        Self {
            filter: Some(expression.into()),
            ..self
        }
    }

    /// Append transforms to the pipeline; earlier transforms run first.
    pub fn with_transforms(self, names: impl Into<NameList>) -> Self {
        let mut transforms = self.transforms;
        transforms.extend(names.into().into_inner());
        Self { transforms, ..self }
    }

    pub fn with_limit(self, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }

    pub fn with_offset(self, offset: usize) -> Self {
        Self {
            offset: Some(offset),
            ..self
        }
    }
}
