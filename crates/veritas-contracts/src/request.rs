//! What the executor sends to the source of truth and what comes back.

use serde::{Deserialize, Serialize};

use crate::filter::Predicate;

/// A result record: an ordered mapping from field name to value.
///
/// Values may be scalars, nested mappings, or sequences of mappings for
/// one-to-many relations.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A filter on the elements of one nested list relation.
///
/// Records are returned whether or not any element matches; only the
/// relation's list is narrowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationFilter {
    /// Field name of the relation, e.g. `primary_ip4_for`.
    pub relation: String,
    pub filter: Predicate,
}

/// One request against one endpoint.
///
/// The filter is already bound to the endpoint schema: every field resolves
/// and every operator is valid for its field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SotRequest {
    /// Logical endpoint name, e.g. `nb.devices`.
    pub endpoint: String,
    /// GraphQL root field, e.g. `devices`.
    pub root: String,
    /// Dotted paths the response must contain, in selection order.
    pub selection: Vec<String>,
    pub filter: Predicate,
    #[serde(default)]
    pub relation_filters: Vec<RelationFilter>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SotRequest {
    pub fn new(endpoint: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            root: root.into(),
            selection: Vec::new(),
            filter: Predicate::All,
            relation_filters: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Add a path to the selection unless it is already there.
    pub fn select(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.selection.contains(&path) {
            self.selection.push(path);
        }
    }
}
