//! Join planning and record combination.
//!
//! A join correlates two endpoints through `leftAlias.path = rightAlias.path`.
//! A path may index one list level (`interfaces_as_tagged[0].device.id`);
//! only that element takes part in the correlation. Records without a
//! matching partner are dropped.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use veritas_contracts::{
    error::{VeritasError, VeritasResult},
    filter::{Comparison, Predicate},
    join::{JoinPlan, KeyPath, PathSegment},
    projection::ProjectionSpec,
    request::Record,
    schema::{FieldDef, FieldKind},
};
use veritas_schema::EndpointHandle;

use crate::projection::project;

fn join_error(reason: impl Into<String>) -> VeritasError {
    VeritasError::JoinResolution {
        reason: reason.into(),
    }
}

// ── Correlation parsing ───────────────────────────────────────────────────────

/// A parsed `on(...)` expression, sides in the order written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub left_alias: String,
    pub left_key: KeyPath,
    pub right_alias: String,
    pub right_key: KeyPath,
}

fn malformed(on: &str) -> VeritasError {
    VeritasError::ParseError {
        reason: format!("correlation '{on}' must have the form 'alias.path = alias.path'"),
    }
}

fn parse_segment(segment: &str, on: &str) -> VeritasResult<PathSegment> {
    let Some((name, rest)) = segment.split_once('[') else {
        if segment.is_empty() || segment.contains(']') {
            return Err(malformed(on));
        }
        return Ok(PathSegment::named(segment));
    };
    let index = rest
        .strip_suffix(']')
        .and_then(|i| i.trim().parse::<usize>().ok())
        .ok_or_else(|| VeritasError::ParseError {
            reason: format!("invalid list index in '{segment}'"),
        })?;
    if name.is_empty() {
        return Err(malformed(on));
    }
    Ok(PathSegment::indexed(name, index))
}

fn parse_side(side: &str, on: &str) -> VeritasResult<(String, KeyPath)> {
    let (alias, path) = side.trim().split_once('.').ok_or_else(|| malformed(on))?;
    if alias.is_empty() || path.is_empty() {
        return Err(malformed(on));
    }
    let segments = path
        .split('.')
        .map(|s| parse_segment(s, on))
        .collect::<VeritasResult<Vec<_>>>()?;
    let key = KeyPath::new(segments);
    if key.segments.iter().filter(|s| s.index.is_some()).count() > 1 {
        return Err(join_error(format!(
            "'{key}' indexes more than one list; only one list index is supported"
        )));
    }
    Ok((alias.to_string(), key))
}

/// Parse `leftAlias.path = rightAlias.path`.
pub fn parse_correlation(on: &str) -> VeritasResult<Correlation> {
    let (lhs, rhs) = on.split_once('=').ok_or_else(|| malformed(on))?;
    if rhs.contains('=') {
        return Err(malformed(on));
    }
    let (left_alias, left_key) = parse_side(lhs, on)?;
    let (right_alias, right_key) = parse_side(rhs, on)?;
    Ok(Correlation {
        left_alias,
        left_key,
        right_alias,
        right_key,
    })
}

// ── Planning ──────────────────────────────────────────────────────────────────

/// Check that `key` resolves on `handle`'s schema.
///
/// Lists must be indexed, scalars must not be, and the path must end at a
/// value rather than a declared relation.
fn validate_path(key: &KeyPath, handle: &EndpointHandle) -> VeritasResult<()> {
    let fail = |reason: String| join_error(format!("'{}.{}': {}", handle.alias, key, reason));

    let mut fields: &[FieldDef] = &handle.schema().fields;
    let last = key.segments.len().saturating_sub(1);

    for (i, segment) in key.segments.iter().enumerate() {
        let def = fields
            .iter()
            .find(|f| f.name == segment.name)
            .ok_or_else(|| fail(format!("'{}' does not resolve on {}", segment.name, handle.name)))?;

        match (def.kind, segment.index) {
            (FieldKind::List, None) => {
                return Err(fail(format!(
                    "'{0}' is a list and needs an index such as '{0}[0]'",
                    segment.name
                )))
            }
            (kind, Some(_)) if kind != FieldKind::List => {
                return Err(fail(format!("'{}' is not a list and cannot be indexed", segment.name)))
            }
            _ => {}
        }

        if def.is_open() {
            return Ok(());
        }
        if i == last {
            if def.kind.is_nested() {
                return Err(fail(format!(
                    "'{}' is a relation; correlate on one of its fields",
                    segment.name
                )));
            }
        } else if !def.kind.is_nested() {
            return Err(fail(format!("'{}' has no nested fields", segment.name)));
        }
        fields = &def.fields;
    }
    Ok(())
}

/// Build the join plan for `left join right on <on>`.
///
/// Both aliases in `on` must be the ones declared by `using()` and `join()`.
/// The sides may be written in either order.
pub fn plan(left: &EndpointHandle, right: &EndpointHandle, on: &str) -> VeritasResult<JoinPlan> {
    if left.alias == right.alias {
        return Err(join_error(format!(
            "both sides of the join use alias '{}'; name one with 'as'",
            left.alias
        )));
    }

    let c = parse_correlation(on)?;
    let (left_key, right_key) = if c.left_alias == left.alias && c.right_alias == right.alias {
        (c.left_key, c.right_key)
    } else if c.left_alias == right.alias && c.right_alias == left.alias {
        (c.right_key, c.left_key)
    } else {
        let undeclared = [&c.left_alias, &c.right_alias]
            .into_iter()
            .find(|a| **a != left.alias && **a != right.alias);
        return Err(match undeclared {
            Some(alias) => join_error(format!("alias '{alias}' is not declared by using() or join()")),
            None => join_error(format!(
                "correlation '{}' must reference both '{}' and '{}'",
                on.trim(),
                left.alias,
                right.alias
            )),
        });
    };

    validate_path(&left_key, left)?;
    validate_path(&right_key, right)?;

    let plan = JoinPlan {
        left_alias: left.alias.clone(),
        left_endpoint: left.name.clone(),
        left_key,
        right_alias: right.alias.clone(),
        right_endpoint: right.name.clone(),
        right_key,
    };
    debug!(%plan, "join planned");
    Ok(plan)
}

// ── Alias splitting ───────────────────────────────────────────────────────────

/// The join side a selected field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

fn qualify(field: &str, left_alias: &str, right_alias: &str) -> (JoinSide, String) {
    match field.split_once('.') {
        Some((alias, rest)) if alias == right_alias && !rest.is_empty() => (JoinSide::Right, rest.to_string()),
        Some((alias, rest)) if alias == left_alias && !rest.is_empty() => (JoinSide::Left, rest.to_string()),
        _ => (JoinSide::Left, field.to_string()),
    }
}

/// Assign alias-qualified fields to their side and strip the qualifier.
/// Unqualified fields belong to the left side.
pub fn split_fields(fields: &[String], left_alias: &str, right_alias: &str) -> (Vec<String>, Vec<String>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for field in fields {
        match qualify(field.trim(), left_alias, right_alias) {
            (JoinSide::Left, f) => left.push(f),
            (JoinSide::Right, f) => right.push(f),
        }
    }
    (left, right)
}

/// The output keys of a joined row, in the order `fields` selects them.
///
/// Keys a projection holds that `fields` does not name, such as relations
/// added for a transform, follow: left side first, then right.
pub fn output_order(
    fields: &[String],
    plan: &JoinPlan,
    left_projection: &ProjectionSpec,
    right_projection: &ProjectionSpec,
) -> Vec<(JoinSide, String)> {
    let mut order: Vec<(JoinSide, String)> = Vec::new();
    let mut push = |side: JoinSide, key: &str| {
        if !order.iter().any(|(s, k)| *s == side && k == key) {
            order.push((side, key.to_string()));
        }
    };

    for field in fields {
        let (side, stripped) = qualify(field.trim(), &plan.left_alias, &plan.right_alias);
        let projection = match side {
            JoinSide::Left => left_projection,
            JoinSide::Right => right_projection,
        };
        if let Some(spec) = projection.fields.iter().find(|f| f.raw == stripped) {
            push(side, spec.output_key());
        }
    }
    for key in left_projection.output_keys() {
        push(JoinSide::Left, key);
    }
    for key in right_projection.output_keys() {
        push(JoinSide::Right, key);
    }
    order
}

pub(crate) fn conjuncts(predicate: Predicate, out: &mut Vec<Predicate>) {
    match predicate {
        Predicate::And(l, r) => {
            conjuncts(*l, out);
            conjuncts(*r, out);
        }
        Predicate::All => {}
        other => out.push(other),
    }
}

pub(crate) fn append(acc: Predicate, next: Predicate) -> Predicate {
    if acc.is_all() {
        next
    } else {
        acc.and(next)
    }
}

/// Split an unbound predicate into the filters of each join side.
///
/// Each top-level `and` term goes to the side its fields name. An `or` term
/// that mixes both sides cannot be sent to either endpoint and is rejected.
pub fn split_predicate(
    predicate: Predicate,
    left_alias: &str,
    right_alias: &str,
) -> VeritasResult<(Predicate, Predicate)> {
    let mut terms = Vec::new();
    conjuncts(predicate, &mut terms);

    let mut left = Predicate::All;
    let mut right = Predicate::All;
    for term in terms {
        let shown = term.to_string();
        let mut sides = Vec::new();
        let stripped = term.try_map(&mut |mut c: Comparison| {
            let (side, field) = qualify(&c.field, left_alias, right_alias);
            sides.push(side);
            c.field = field;
            Ok::<_, VeritasError>(c)
        })?;

        if sides.contains(&JoinSide::Left) && sides.contains(&JoinSide::Right) {
            return Err(join_error(format!(
                "'{shown}' mixes fields of '{left_alias}' and '{right_alias}' inside 'or'"
            )));
        }
        if sides.contains(&JoinSide::Right) {
            right = append(right, stripped);
        } else {
            left = append(left, stripped);
        }
    }
    Ok((left, right))
}

// ── Combination ───────────────────────────────────────────────────────────────

/// Join keys compare as canonical JSON, so the number `1` and the string
/// `"1"` are different keys.
fn key_text(value: &Value) -> String {
    value.to_string()
}

fn merge_sides(
    left_row: &Record,
    right_row: &Record,
    plan: &JoinPlan,
    order: &[(JoinSide, String)],
    left_projection: &ProjectionSpec,
    right_projection: &ProjectionSpec,
) -> Record {
    let mut row = Record::new();
    for (side, key) in order {
        let (source, other, alias) = match side {
            JoinSide::Left => (left_row, right_projection, &plan.left_alias),
            JoinSide::Right => (right_row, left_projection, &plan.right_alias),
        };
        let name = if other.contains_key(key) {
            format!("{alias}.{key}")
        } else {
            key.clone()
        };
        row.insert(name, source.get(key).cloned().unwrap_or(Value::Null));
    }
    row
}

/// Inner-join `left` and `right` on the plan's correlation paths.
///
/// Output rows keep left order, then right order among equal keys. Row keys
/// follow `order` (see [`output_order`]); a key selected on both sides is
/// qualified with its alias on each side.
pub fn combine(
    left: &[Record],
    right: &[Record],
    plan: &JoinPlan,
    order: &[(JoinSide, String)],
    left_projection: &ProjectionSpec,
    right_projection: &ProjectionSpec,
) -> Vec<Record> {
    let mut index: HashMap<String, Vec<&Record>> = HashMap::new();
    for record in right {
        if let Some(key) = plan.right_key.extract_from(record) {
            index.entry(key_text(key)).or_default().push(record);
        }
    }

    let mut rows = Vec::new();
    for record in left {
        let Some(key) = plan.left_key.extract_from(record) else {
            continue;
        };
        let Some(partners) = index.get(&key_text(key)) else {
            continue;
        };
        let left_row = project(record, left_projection);
        for partner in partners {
            rows.push(merge_sides(
                &left_row,
                &project(partner, right_projection),
                plan,
                order,
                left_projection,
                right_projection,
            ));
        }
    }

    debug!(
        left = left.len(),
        right = right.len(),
        joined = rows.len(),
        "join combined"
    );
    rows
}
