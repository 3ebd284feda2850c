//! An in-memory source of truth.
//!
//! `InMemoryBackend` answers `SotRequest`s from fixture tables the way
//! nautobot's GraphQL API would: the bound filter is evaluated against the
//! stored objects, paging is applied, relation filters narrow the nested
//! lists they name, and each match is shaped to the
//! request's selection with the same [`SelectionNode`] tree the GraphQL
//! renderer produces.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use serde_json::{Map, Value};
use tracing::debug;

use veritas_contracts::{
    error::{VeritasError, VeritasResult},
    filter::{Comparison, Operator, Predicate},
    net::Cidr,
    request::{Record, RelationFilter, SotRequest},
    schema::{EndpointSchema, FieldKind, FilterLookup},
};
use veritas_core::{
    traits::SotBackend,
    translate::{selection_tree, SelectionNode},
};
use veritas_query::filter::{filter_target, FilterTarget};
use veritas_schema::SchemaRegistry;

/// Every request a backend received, in arrival order.
pub type RequestLog = Arc<Mutex<Vec<SotRequest>>>;

/// A `SotBackend` over fixture tables keyed by logical endpoint name.
pub struct InMemoryBackend {
    registry: Arc<SchemaRegistry>,
    tables: HashMap<String, Vec<Record>>,
    calls: AtomicUsize,
    log: RequestLog,
}

impl InMemoryBackend {
    pub fn new(registry: Arc<SchemaRegistry>, tables: HashMap<String, Vec<Record>>) -> Self {
        Self {
            registry,
            tables,
            calls: AtomicUsize::new(0),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of requests answered so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared handle on the request log. Stays readable after the backend
    /// has been handed to an executor.
    pub fn request_log(&self) -> RequestLog {
        Arc::clone(&self.log)
    }

    fn schema(&self, endpoint: &str) -> VeritasResult<&EndpointSchema> {
        self.registry
            .endpoint(endpoint)
            .map(|s| s.as_ref())
            .ok_or_else(|| VeritasError::Transport {
                reason: format!("no such endpoint '{endpoint}' on the lab source of truth"),
            })
    }

    /// Drop the elements of each filtered relation that fail its filter. The
    /// record itself is kept even when no element survives.
    fn narrow(&self, record: &Record, filters: &[RelationFilter], schema: &EndpointSchema) -> VeritasResult<Record> {
        let mut record = record.clone();
        for scoped in filters {
            let source = schema
                .field(&scoped.relation)
                .and_then(|f| f.source.as_deref())
                .unwrap_or(scoped.relation.as_str());
            let Some(Value::Array(items)) = record.get_mut(source) else {
                continue;
            };
            let mut kept = Vec::with_capacity(items.len());
            for item in items.drain(..) {
                let keep = match &item {
                    Value::Object(element) => self.matches(&scoped.filter, element, schema)?,
                    _ => false,
                };
                if keep {
                    kept.push(item);
                }
            }
            *items = kept;
        }
        Ok(record)
    }

    fn matches(&self, predicate: &Predicate, record: &Record, schema: &EndpointSchema) -> VeritasResult<bool> {
        Ok(match predicate {
            Predicate::All => true,
            Predicate::Compare(c) => {
                let target = filter_target(&c.field, schema, &self.registry)?;
                compare(c, &target, record)
            }
            Predicate::And(l, r) => self.matches(l, record, schema)? && self.matches(r, record, schema)?,
            Predicate::Or(l, r) => self.matches(l, record, schema)? || self.matches(r, record, schema)?,
        })
    }
}

impl SotBackend for InMemoryBackend {
    fn fetch(&self, request: &SotRequest) -> VeritasResult<Vec<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.log.lock() {
            log.push(request.clone());
        }

        let schema = self.schema(&request.endpoint)?;
        let table = self.tables.get(&request.endpoint).ok_or_else(|| VeritasError::Transport {
            reason: format!("endpoint '{}' has no data in the lab", request.endpoint),
        })?;

        let mut selected = Vec::new();
        for record in table {
            if self.matches(&request.filter, record, schema)? {
                selected.push(record);
            }
        }
        let total = selected.len();

        let shape = selection_tree(&request.selection, schema);
        let mut records = Vec::new();
        for record in selected
            .into_iter()
            .skip(request.offset.unwrap_or(0))
            .take(request.limit.unwrap_or(usize::MAX))
        {
            let narrowed = self.narrow(record, &request.relation_filters, schema)?;
            records.push(shape_record(&narrowed, &shape));
        }

        debug!(
            endpoint = %request.endpoint,
            matched = total,
            returned = records.len(),
            "lab request answered"
        );
        Ok(records)
    }
}

// ── Filter evaluation ─────────────────────────────────────────────────────────

/// Collect the textual values found at `path` below `value`, looking through
/// lists at every level.
fn collect(value: &Value, path: &[&str], out: &mut Vec<String>) {
    match (value, path.split_first()) {
        (Value::Array(items), _) => items.iter().for_each(|v| collect(v, path, out)),
        (Value::Object(map), Some((head, tail))) => {
            if let Some(v) = map.get(*head) {
                collect(v, tail, out);
            }
        }
        (Value::String(s), None) => out.push(s.clone()),
        (Value::Bool(b), None) => out.push(b.to_string()),
        (Value::Number(n), None) => out.push(n.to_string()),
        _ => {}
    }
}

fn network(text: &str, kind: FieldKind) -> Option<Cidr> {
    let cidr: Cidr = text.parse().ok()?;
    match kind {
        // An interface address tests by its host part.
        FieldKind::Address => cidr.addr().to_string().parse().ok(),
        _ => Some(cidr),
    }
}

/// True when some record value lies inside some filter network.
fn within(filters: &[String], values: &[String], kind: FieldKind) -> bool {
    let networks: Vec<Cidr> = filters.iter().filter_map(|f| f.parse().ok()).collect();
    values
        .iter()
        .filter_map(|v| network(v, kind))
        .any(|v| networks.iter().any(|n| n.contains(&v)))
}

fn compare(c: &Comparison, target: &FilterTarget, record: &Record) -> bool {
    let path: Vec<&str> = target.path.split('.').collect();
    let mut values = Vec::new();
    if let Some((head, tail)) = path.split_first() {
        if let Some(v) = record.get(*head) {
            collect(v, tail, &mut values);
        }
    }
    let wanted = c.value.texts();

    let equal = || match target.lookup {
        FilterLookup::Within => within(&wanted, &values, target.kind),
        FilterLookup::Exact => values.iter().any(|v| wanted.contains(v)),
    };

    match c.operator {
        Operator::Eq => equal(),
        Operator::NotEq => !equal(),
        Operator::IContains => {
            let wanted: Vec<String> = wanted.iter().map(|w| w.to_lowercase()).collect();
            values
                .iter()
                .any(|v| wanted.iter().any(|w| v.to_lowercase().contains(w.as_str())))
        }
        Operator::WithinInclude => within(&wanted, &values, target.kind),
    }
}

// ── Response shaping ──────────────────────────────────────────────────────────

fn shape_value(value: &Value, nodes: &[SelectionNode]) -> Value {
    match value {
        Value::Object(map) => Value::Object(shape_record(map, nodes)),
        Value::Array(items) => Value::Array(items.iter().map(|v| shape_value(v, nodes)).collect()),
        other => other.clone(),
    }
}

/// Rebuild `record` with exactly the selected keys, renamed to their
/// response names. Missing attributes come back as `null`.
fn shape_record(record: &Map<String, Value>, nodes: &[SelectionNode]) -> Record {
    let mut out = Record::new();
    for node in nodes {
        let value = match record.get(&node.source) {
            Some(v) if node.children.is_empty() => v.clone(),
            Some(v) => shape_value(v, &node.children),
            None => Value::Null,
        };
        out.insert(node.name.clone(), value);
    }
    out
}
