//! Join plan and correlation path types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::Record;

/// One step of a correlation path, e.g. `interfaces_as_tagged[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub name: String,
    /// Element of a one-to-many relation to follow. Only this element takes
    /// part in the correlation.
    pub index: Option<usize>,
}

impl PathSegment {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    pub fn indexed(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }
}

/// A path inside a record, e.g. `interfaces_as_tagged[0].device.id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPath {
    pub segments: Vec<PathSegment>,
}

impl KeyPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// The top-level field the path starts at.
    pub fn root(&self) -> &str {
        self.segments.first().map(|s| s.name.as_str()).unwrap_or_default()
    }

    /// The path with indices removed, as the source of truth selects it.
    pub fn fetch_path(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Follow the path through `value`.
    ///
    /// Returns `None` when a segment is missing, when an index is out of
    /// range, or when a list is reached without an index. A `null` at the end
    /// of the path also counts as missing.
    pub fn extract<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.extract_from(value.as_object()?)
    }

    /// Same as [`KeyPath::extract`], starting from a result record.
    pub fn extract_from<'v>(&self, record: &'v Record) -> Option<&'v Value> {
        let mut object = record;
        let mut current: Option<&Value> = None;
        for segment in &self.segments {
            if let Some(value) = current {
                object = value.as_object()?;
            }
            let mut value = object.get(&segment.name)?;
            if let Some(index) = segment.index {
                value = value.as_array()?.get(index)?;
            }
            current = Some(value);
        }
        current.filter(|v| !v.is_null())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s.index {
                Some(i) => format!("{}[{}]", s.name, i),
                None => s.name.clone(),
            })
            .collect();
        f.write_str(&parts.join("."))
    }
}

/// How two endpoint result sets are combined.
///
/// Inner-join semantics: records whose correlation values do not match a
/// record on the other side are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPlan {
    pub left_alias: String,
    pub left_endpoint: String,
    pub left_key: KeyPath,
    pub right_alias: String,
    pub right_endpoint: String,
    pub right_key: KeyPath,
}

impl fmt::Display for JoinPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} as {} join {} as {} on {}.{} = {}.{}",
            self.left_endpoint,
            self.left_alias,
            self.right_endpoint,
            self.right_alias,
            self.left_alias,
            self.left_key,
            self.right_alias,
            self.right_key
        )
    }
}
