//! Field projection: resolving `select(...)` lists and shaping result records.

use serde_json::{Map, Value};
use tracing::debug;

use veritas_contracts::{
    error::{VeritasError, VeritasResult},
    projection::{FieldRef, FieldSpec, ProjectionSpec, CUSTOM_FIELD_DATA, CUSTOM_FIELD_PREFIX},
    request::Record,
    schema::{EndpointSchema, FieldDef},
};
use veritas_schema::SchemaRegistry;

/// Resolve one selected field against `endpoint`.
///
/// `cf_X` must name a registered custom field on an endpoint that carries
/// custom fields. Dotted paths must follow declared relations, except below
/// an open relation where any deeper path is accepted.
pub fn resolve_field(
    raw: &str,
    endpoint: &EndpointSchema,
    registry: &SchemaRegistry,
) -> VeritasResult<FieldSpec> {
    let raw = raw.trim();
    let unknown = || VeritasError::UnknownField {
        field: raw.to_string(),
        endpoint: endpoint.name.clone(),
    };

    if let Some(name) = raw.strip_prefix(CUSTOM_FIELD_PREFIX) {
        if !endpoint.custom_fields || registry.custom_field(name).is_none() {
            return Err(unknown());
        }
        return Ok(FieldSpec::new(raw, FieldRef::Custom(name.to_string())));
    }

    let segments: Vec<&str> = raw.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(unknown());
    }

    let root = endpoint.field(segments[0]).ok_or_else(unknown)?;
    if segments.len() == 1 {
        return Ok(FieldSpec::new(raw, FieldRef::Plain(raw.to_string())));
    }

    walk(root, &segments[1..]).ok_or_else(unknown)?;
    Ok(FieldSpec::new(
        raw,
        FieldRef::Path(segments.iter().map(|s| s.to_string()).collect()),
    ))
}

/// Follow `rest` below `def`. `None` when the path leaves the declared shape.
fn walk(def: &FieldDef, rest: &[&str]) -> Option<()> {
    let Some((head, tail)) = rest.split_first() else {
        return Some(());
    };
    if def.is_open() {
        return Some(());
    }
    if !def.kind.is_nested() {
        return None;
    }
    walk(def.child(head)?, tail)
}

/// Resolve a whole field list, preserving caller order.
pub fn resolve(
    fields: &[String],
    endpoint: &EndpointSchema,
    registry: &SchemaRegistry,
) -> VeritasResult<ProjectionSpec> {
    let specs = fields
        .iter()
        .map(|f| resolve_field(f, endpoint, registry))
        .collect::<VeritasResult<Vec<_>>>()?;
    let projection = ProjectionSpec::new(specs);
    debug!(endpoint = %endpoint.name, keys = ?projection.output_keys(), "projection resolved");
    Ok(projection)
}

// ── Record shaping ────────────────────────────────────────────────────────────

/// Pick `rest` out of `value`, keeping the nesting. Lists are mapped element
/// by element.
fn pick(value: &Value, rest: &[String]) -> Value {
    let Some((head, tail)) = rest.split_first() else {
        return value.clone();
    };
    match value {
        Value::Object(map) => {
            let inner = map.get(head).map(|v| pick(v, tail)).unwrap_or(Value::Null);
            let mut out = Map::new();
            out.insert(head.clone(), inner);
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| pick(v, rest)).collect()),
        _ => Value::Null,
    }
}

/// Merge `src` into `target`: objects key by key, equal-length lists element
/// by element, anything else replaces.
fn merge(target: &mut Value, src: Value) {
    match (target, src) {
        (Value::Object(t), Value::Object(s)) => {
            for (k, v) in s {
                match t.get_mut(&k) {
                    Some(existing) => merge(existing, v),
                    None => {
                        t.insert(k, v);
                    }
                }
            }
        }
        (Value::Array(t), Value::Array(s)) if t.len() == s.len() => {
            for (existing, v) in t.iter_mut().zip(s) {
                merge(existing, v);
            }
        }
        (t, s) => *t = s,
    }
}

/// Shape `record` to exactly the projection's output keys, in order.
///
/// Missing values surface as `null`. Custom fields surface under
/// `custom_field_data`, never under their bare name.
pub fn project(record: &Record, spec: &ProjectionSpec) -> Record {
    let mut out = Record::new();
    for field in &spec.fields {
        match &field.field {
            FieldRef::Plain(name) => {
                out.insert(name.clone(), record.get(name).cloned().unwrap_or(Value::Null));
            }
            FieldRef::Path(segments) => {
                let Some((head, tail)) = segments.split_first() else {
                    continue;
                };
                let picked = record.get(head).map(|v| pick(v, tail)).unwrap_or(Value::Null);
                match out.get_mut(head) {
                    Some(existing) => merge(existing, picked),
                    None => {
                        out.insert(head.clone(), picked);
                    }
                }
            }
            FieldRef::Custom(name) => {
                let value = record
                    .get(CUSTOM_FIELD_DATA)
                    .and_then(|bag| bag.get(name))
                    .cloned()
                    .unwrap_or(Value::Null);
                let bag = out
                    .entry(CUSTOM_FIELD_DATA)
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(map) = bag {
                    map.insert(name.clone(), value);
                }
            }
        }
    }
    out
}
