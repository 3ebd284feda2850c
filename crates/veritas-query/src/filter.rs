//! Filter expressions: parsing, schema binding, and condensing.
//!
//! [`parse`] turns `where(...)` text into an unbound [`Predicate`]. [`bind`]
//! checks every leaf against the endpoint schema and coerces values to the
//! field's type. [`condense`] folds `f=a or f=b` into `f=[a,b]`, the form the
//! source of truth can answer in a single request. [`split_relation_filters`]
//! moves terms such as `pip4for_cf_net=testnet` off the endpoint's own filter
//! and onto the nested relation they narrow.
//!
//! Grammar:
//!
//! ```text
//! expression := term ((and | or | ,) term)*
//! term       := field ("=" | "!=") value
//! value      := word | quoted | "[" (word | quoted) ("," (word | quoted))* "]"
//! ```
//!
//! There is no precedence and no grouping: combinators fold strictly left to
//! right, so `a or b and c` is `(a or b) and c`.

use std::fmt;

use tracing::debug;

use veritas_contracts::{
    error::{VeritasError, VeritasResult},
    filter::{Comparison, FilterValue, Operator, Predicate},
    net::Cidr,
    projection::{CUSTOM_FIELD_PREFIX, CUSTOM_FIELD_SOURCE},
    request::RelationFilter,
    schema::{CustomFieldDef, CustomFieldType, EndpointSchema, FieldKind, FilterDef, FilterLookup},
};
use veritas_schema::SchemaRegistry;

use crate::join::{append, conjuncts};

/// Name of the bare CIDR containment filter.
pub const WITHIN_INCLUDE: &str = "within_include";

fn parse_error(reason: impl Into<String>) -> VeritasError {
    VeritasError::ParseError {
        reason: reason.into(),
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    LBracket,
    RBracket,
    Comma,
    Eq,
    NotEq,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{w}'"),
            Token::Quoted(q) => write!(f, "\"{q}\""),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
            Token::Eq => f.write_str("'='"),
            Token::NotEq => f.write_str("'!='"),
        }
    }
}

const DELIMITERS: &str = "[],=!\"'";

fn tokenize(input: &str) -> VeritasResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '[' | ']' | ',' | '=' => {
                chars.next();
                tokens.push(match c {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    _ => Token::Eq,
                });
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(parse_error("'!' must be followed by '='"));
                }
                tokens.push(Token::NotEq);
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for ch in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(parse_error(format!("unterminated quoted value {c}{value}")));
                }
                tokens.push(Token::Quoted(value));
            }
            _ => {
                let mut word = String::new();
                while let Some(ch) = chars.next_if(|ch| !ch.is_whitespace() && !DELIMITERS.contains(*ch)) {
                    word.push(ch);
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

// ── Parser ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Combinator {
    And,
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => f.write_str("and"),
            Combinator::Or => f.write_str("or"),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expression(&mut self) -> VeritasResult<Predicate> {
        let mut predicate = self.term()?;

        while let Some(token) = self.next() {
            let combinator = match token {
                Token::Comma => Combinator::And,
                Token::Word(ref w) if w.eq_ignore_ascii_case("and") => Combinator::And,
                Token::Word(ref w) if w.eq_ignore_ascii_case("or") => Combinator::Or,
                other => {
                    return Err(parse_error(format!(
                        "expected 'and' or 'or' after {predicate}, found {other}"
                    )))
                }
            };
            if self.at_end() {
                return Err(parse_error(format!("expression ends with a dangling '{combinator}'")));
            }
            let rhs = self.term()?;
            predicate = match combinator {
                Combinator::And => predicate.and(rhs),
                Combinator::Or => predicate.or(rhs),
            };
        }
        Ok(predicate)
    }

    fn term(&mut self) -> VeritasResult<Predicate> {
        let lhs = match self.next() {
            Some(Token::Word(w)) => w,
            Some(other) => return Err(parse_error(format!("expected a field name, found {other}"))),
            None => return Err(parse_error("expected a field name at end of expression")),
        };
        let negated = match self.next() {
            Some(Token::Eq) => false,
            Some(Token::NotEq) => true,
            _ => return Err(parse_error(format!("term '{lhs}' lacks an operator"))),
        };
        let value = self.value(&lhs)?;
        let (field, operator) = split_lookup(&lhs, negated)?;
        Ok(Predicate::Compare(Comparison::new(field, operator, value)))
    }

    fn value(&mut self, lhs: &str) -> VeritasResult<FilterValue> {
        match self.next() {
            Some(Token::Word(w)) | Some(Token::Quoted(w)) => Ok(FilterValue::Text(w)),
            Some(Token::LBracket) => self.list(lhs),
            _ => Err(parse_error(format!("term '{lhs}' lacks a value"))),
        }
    }

    fn list(&mut self, lhs: &str) -> VeritasResult<FilterValue> {
        let mut items = Vec::new();
        loop {
            match self.next() {
                Some(Token::Word(w)) | Some(Token::Quoted(w)) => items.push(w),
                Some(Token::RBracket) if items.is_empty() => {
                    return Err(parse_error(format!("term '{lhs}' has an empty list")))
                }
                _ => return Err(parse_error(format!("malformed list in term '{lhs}'"))),
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => return Ok(FilterValue::List(items)),
                _ => return Err(parse_error(format!("unterminated list in term '{lhs}'"))),
            }
        }
    }
}

/// Split `name__ic`, `name__n`, `prefix__within_include` into field and operator.
fn split_lookup(lhs: &str, negated: bool) -> VeritasResult<(String, Operator)> {
    let (field, operator) = if lhs == WITHIN_INCLUDE {
        (lhs, Operator::WithinInclude)
    } else if let Some(field) = lhs.strip_suffix(Operator::WithinInclude.lookup_suffix()) {
        (field, Operator::WithinInclude)
    } else if let Some(field) = lhs.strip_suffix(Operator::IContains.lookup_suffix()) {
        (field, Operator::IContains)
    } else if let Some(field) = lhs.strip_suffix(Operator::NotEq.lookup_suffix()) {
        (field, Operator::NotEq)
    } else {
        (lhs, Operator::Eq)
    };

    if field.is_empty() {
        return Err(parse_error(format!("term '{lhs}' lacks a field name")));
    }

    let operator = match (negated, operator) {
        (false, op) => op,
        (true, Operator::Eq) => Operator::NotEq,
        (true, op) => {
            return Err(parse_error(format!(
                "'!=' cannot be combined with the '{}' lookup in '{lhs}'",
                op.lookup_suffix()
            )))
        }
    };
    Ok((field.to_string(), operator))
}

/// Parse a filter expression into an unbound predicate tree.
///
/// An empty or whitespace-only expression selects everything.
pub fn parse(expression: &str) -> VeritasResult<Predicate> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Ok(Predicate::All);
    }
    let predicate = Parser { tokens, pos: 0 }.expression()?;
    debug!(%predicate, "filter parsed");
    Ok(predicate)
}

// ── Binding ───────────────────────────────────────────────────────────────────

/// What a filter field resolves to on one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTarget {
    /// Dotted path of the stored attribute the filter tests.
    pub path: String,
    pub kind: FieldKind,
    pub lookup: FilterLookup,
    /// Set when the field is a `cf_` custom field.
    pub custom: Option<CustomFieldType>,
    /// Set when the filter applies to the elements of a nested relation;
    /// `path` is then relative to one element.
    pub relation: Option<String>,
}

impl FilterTarget {
    fn custom_field(name: &str, def: &CustomFieldDef) -> Self {
        Self {
            path: format!("{CUSTOM_FIELD_SOURCE}.{name}"),
            kind: def.kind(),
            lookup: FilterLookup::Exact,
            custom: Some(def.field_type),
            relation: None,
        }
    }

    fn declared(def: &FilterDef) -> Self {
        Self {
            path: def.record_path().to_string(),
            kind: def.kind,
            lookup: def.lookup,
            custom: None,
            relation: None,
        }
    }
}

/// Resolve a filter field name.
///
/// Names carrying a relation filter prefix (`pip4for_cf_net`) resolve against
/// that relation's filter set. Otherwise `cf_` names resolve through the
/// registry's custom fields, then declared filters are tried, then plain
/// selectable fields.
pub fn filter_target(
    field: &str,
    endpoint: &EndpointSchema,
    registry: &SchemaRegistry,
) -> VeritasResult<FilterTarget> {
    let unknown = || VeritasError::UnknownField {
        field: field.to_string(),
        endpoint: endpoint.name.clone(),
    };

    let scoped = endpoint
        .relation_filter(field)
        .and_then(|def| field.strip_prefix(def.prefix.as_str()).map(|name| (def, name)));
    if let Some((def, name)) = scoped {
        let mut target = match name.strip_prefix(CUSTOM_FIELD_PREFIX) {
            Some(cf) => {
                let cf_def = registry
                    .custom_field(cf)
                    .filter(|_| def.custom_fields)
                    .ok_or_else(unknown)?;
                FilterTarget::custom_field(cf, cf_def)
            }
            None => FilterTarget::declared(def.filter(name).ok_or_else(unknown)?),
        };
        target.relation = Some(def.relation.clone());
        return Ok(target);
    }

    if let Some(name) = field.strip_prefix(CUSTOM_FIELD_PREFIX) {
        let def = registry
            .custom_field(name)
            .filter(|_| endpoint.custom_fields)
            .ok_or_else(unknown)?;
        return Ok(FilterTarget::custom_field(name, def));
    }

    if let Some(def) = endpoint.filter(field) {
        return Ok(FilterTarget::declared(def));
    }

    match endpoint.field(field) {
        Some(def) if !def.kind.is_nested() => Ok(FilterTarget {
            path: def.source.clone().unwrap_or_else(|| def.name.clone()),
            kind: def.kind,
            lookup: FilterLookup::Exact,
            custom: None,
            relation: None,
        }),
        _ => Err(unknown()),
    }
}

fn bind_comparison(mut c: Comparison, target: &FilterTarget) -> VeritasResult<Comparison> {
    match c.operator {
        Operator::WithinInclude => {
            if target.kind != FieldKind::Prefix {
                return Err(parse_error(format!(
                    "within_include requires a prefix-typed field, '{}' is {}",
                    c.field, target.kind
                )));
            }
            for text in c.value.texts() {
                text.parse::<Cidr>()?;
            }
        }
        Operator::IContains if !target.kind.supports_contains() => {
            return Err(parse_error(format!(
                "'__ic' is not supported on {} field '{}'",
                target.kind, c.field
            )));
        }
        _ => {}
    }

    if target.lookup == FilterLookup::Within {
        for text in c.value.texts() {
            text.parse::<Cidr>()?;
        }
    }

    match target.kind {
        FieldKind::Integer => {
            let field = c.field.clone();
            let canonical = |text: String| {
                text.trim()
                    .parse::<i64>()
                    .map(|n| n.to_string())
                    .map_err(|_| parse_error(format!("integer field '{field}' got non-integer value '{text}'")))
            };
            c.value = match c.value {
                FilterValue::Text(t) => FilterValue::Text(canonical(t)?),
                FilterValue::List(items) => {
                    FilterValue::List(items.into_iter().map(canonical).collect::<VeritasResult<_>>()?)
                }
                FilterValue::Bool(b) => {
                    return Err(parse_error(format!("integer field '{field}' got non-integer value '{b}'")))
                }
            };
        }
        FieldKind::Boolean => {
            c.value = match c.value {
                FilterValue::Text(t) => FilterValue::Bool(t.to_lowercase().contains("true")),
                FilterValue::Bool(b) => FilterValue::Bool(b),
                FilterValue::List(_) => {
                    return Err(parse_error(format!(
                        "boolean field '{}' takes a single value",
                        c.field
                    )))
                }
            };
        }
        _ => {}
    }
    Ok(c)
}

/// Check every leaf of `predicate` against `endpoint` and coerce its value.
///
/// Unknown fields fail with `UnknownField`; operators the field's type
/// forbids, invalid networks, and non-integer values fail with `ParseError`.
pub fn bind(
    predicate: Predicate,
    endpoint: &EndpointSchema,
    registry: &SchemaRegistry,
) -> VeritasResult<Predicate> {
    predicate.try_map(&mut |c: Comparison| {
        let target = filter_target(&c.field, endpoint, registry)?;
        bind_comparison(c, &target)
    })
}

// ── Condensing ────────────────────────────────────────────────────────────────

fn is_text_custom_field(field: &str, endpoint: &EndpointSchema, registry: &SchemaRegistry) -> bool {
    filter_target(field, endpoint, registry).is_ok_and(|t| t.custom == Some(CustomFieldType::Text))
}

fn mergeable(a: &Comparison, b: &Comparison, endpoint: &EndpointSchema, registry: &SchemaRegistry) -> bool {
    a.field == b.field
        && a.operator == Operator::Eq
        && b.operator == Operator::Eq
        && !matches!(a.value, FilterValue::Bool(_))
        && !matches!(b.value, FilterValue::Bool(_))
        && !is_text_custom_field(&a.field, endpoint, registry)
}

/// Fold `f=a or f=b` into the set-membership leaf `f=[a,b]`.
///
/// Applied bottom-up, so a left-to-right chain `f=a or f=b or f=c` becomes a
/// single leaf. Text custom fields are never folded.
pub fn condense(predicate: Predicate, endpoint: &EndpointSchema, registry: &SchemaRegistry) -> Predicate {
    match predicate {
        Predicate::Or(l, r) => {
            let l = condense(*l, endpoint, registry);
            let r = condense(*r, endpoint, registry);
            match (l, r) {
                (Predicate::Compare(a), Predicate::Compare(b)) if mergeable(&a, &b, endpoint, registry) => {
                    let mut values = a.value.texts();
                    for text in b.value.texts() {
                        if !values.contains(&text) {
                            values.push(text);
                        }
                    }
                    Predicate::Compare(Comparison::new(a.field, Operator::Eq, FilterValue::List(values)))
                }
                (l, r) => l.or(r),
            }
        }
        Predicate::And(l, r) => condense(*l, endpoint, registry).and(condense(*r, endpoint, registry)),
        other => other,
    }
}

// ── Relation filters ──────────────────────────────────────────────────────────

/// Separate the top-level `and` terms that filter a nested relation from
/// the ones that filter the endpoint's own records.
///
/// Terms on the same relation are and-ed into one [`RelationFilter`], in
/// first-appearance order. A term mixing a relation's filters with any
/// other filter fails with `ParseError`.
pub fn split_relation_filters(
    predicate: Predicate,
    endpoint: &EndpointSchema,
    registry: &SchemaRegistry,
) -> VeritasResult<(Predicate, Vec<RelationFilter>)> {
    let mut terms = Vec::new();
    conjuncts(predicate, &mut terms);

    let mut own = Predicate::All;
    let mut scoped: Vec<RelationFilter> = Vec::new();
    for term in terms {
        let relations = term
            .comparisons()
            .into_iter()
            .map(|c| filter_target(&c.field, endpoint, registry).map(|t| t.relation))
            .collect::<VeritasResult<Vec<_>>>()?;
        let relation = relations.first().cloned().flatten();
        if relations.iter().any(|r| *r != relation) {
            return Err(parse_error(format!(
                "'{term}' mixes filters on different relations inside 'or'"
            )));
        }

        match relation {
            None => own = append(own, term),
            Some(relation) => match scoped.iter_mut().find(|s| s.relation == relation) {
                Some(existing) => {
                    let acc = std::mem::replace(&mut existing.filter, Predicate::All);
                    existing.filter = append(acc, term);
                }
                None => scoped.push(RelationFilter { relation, filter: term }),
            },
        }
    }

    if !scoped.is_empty() {
        debug!(
            endpoint = %endpoint.name,
            relations = ?scoped.iter().map(|s| s.relation.as_str()).collect::<Vec<_>>(),
            "relation filters separated"
        );
    }
    Ok((own, scoped))
}
