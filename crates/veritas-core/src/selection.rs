//! The fluent query surface.
//!
//! ```rust,ignore
//! let rows = executor
//!     .select("hostname, platform.name")
//!     .using("nb.devices")
//!     .transform("remove_id")
//!     .where_("name__ic=local")?;
//! ```
//!
//! Each call consumes the builder and returns a new one, so a chain never
//! shares state with another chain. `where_` (and `all`) end the chain and
//! run the query.

use serde_json::Value;

use veritas_contracts::{
    error::VeritasResult,
    query::{NameList, QueryDescriptor},
};

use crate::executor::Executor;
use crate::translate::GraphqlQuery;

/// A query under construction, bound to the executor that will run it.
#[derive(Clone)]
pub struct Selection<'e> {
    executor: &'e Executor,
    descriptor: QueryDescriptor,
}

impl<'e> Selection<'e> {
    pub(crate) fn new(executor: &'e Executor, fields: NameList) -> Self {
        Self {
            executor,
            descriptor: QueryDescriptor::new(fields),
        }
    }

    fn map(self, f: impl FnOnce(QueryDescriptor) -> QueryDescriptor) -> Self {
        Self {
            executor: self.executor,
            descriptor: f(self.descriptor),
        }
    }

    /// Bind the primary endpoint: `namespace.table[ as alias]`.
    pub fn using(self, table: impl Into<String>) -> Self {
        self.map(|d| d.with_using(table))
    }

    /// Add a second endpoint: `namespace.table[ as alias]`.
    pub fn join(self, table: impl Into<String>) -> Self {
        self.map(|d| d.with_join(table))
    }

    /// Correlate the joined endpoints: `leftAlias.path = rightAlias.path`.
    pub fn on(self, correlation: impl Into<String>) -> Self {
        self.map(|d| d.with_on(correlation))
    }

    /// Append one transform, or several as a comma-joined string or sequence.
    pub fn transform(self, names: impl Into<NameList>) -> Self {
        self.map(|d| d.with_transforms(names))
    }

    pub fn limit(self, limit: usize) -> Self {
        self.map(|d| d.with_limit(limit))
    }

    pub fn offset(self, offset: usize) -> Self {
        self.map(|d| d.with_offset(offset))
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Run the query with `expression` as filter.
    pub fn where_(self, expression: &str) -> VeritasResult<Vec<Value>> {
        let descriptor = self.descriptor.with_filter(expression);
        self.executor.execute(&descriptor)
    }

    /// Run the query without a filter.
    pub fn all(self) -> VeritasResult<Vec<Value>> {
        self.where_("")
    }

    /// Render the requests `where_(expression)` would issue, without
    /// issuing them.
    pub fn explain(self, expression: &str) -> VeritasResult<Vec<GraphqlQuery>> {
        let descriptor = self.descriptor.with_filter(expression);
        self.executor.explain(&descriptor)
    }
}
