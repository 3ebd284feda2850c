//! Endpoint names and resolved endpoint handles.

use std::sync::Arc;

use veritas_contracts::{
    error::{VeritasError, VeritasResult},
    schema::EndpointSchema,
};

/// A parsed `namespace.table[ as alias]` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointName {
    /// Full logical name, e.g. `nb.devices`.
    pub table: String,
    /// Alias used for join keys; defaults to the bare table name.
    pub alias: String,
}

impl EndpointName {
    pub fn parse(spec: &str) -> VeritasResult<Self> {
        let words: Vec<&str> = spec.split_whitespace().collect();
        let (table, alias) = match words.as_slice() {
            [table] => (*table, None),
            [table, kw, alias] if kw.eq_ignore_ascii_case("as") => (*table, Some(*alias)),
            _ => {
                return Err(VeritasError::ParseError {
                    reason: format!("expected 'namespace.table[ as alias]', got '{}'", spec.trim()),
                })
            }
        };

        let bare = match table.split_once('.') {
            Some((ns, bare)) if !ns.is_empty() && !bare.is_empty() => bare,
            _ => {
                return Err(VeritasError::UnknownEndpoint {
                    name: table.to_string(),
                })
            }
        };

        Ok(Self {
            table: table.to_string(),
            alias: alias.unwrap_or(bare).to_string(),
        })
    }
}

/// An endpoint bound to its schema and alias.
#[derive(Debug, Clone)]
pub struct EndpointHandle {
    pub name: String,
    pub alias: String,
    pub schema: Arc<EndpointSchema>,
}

impl EndpointHandle {
    pub fn schema(&self) -> &EndpointSchema {
        &self.schema
    }
}
