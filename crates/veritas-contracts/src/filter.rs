//! Predicate tree types produced by the filter parser.
//!
//! A predicate is a binary tree of `and` / `or` combinators over leaf
//! comparisons. Combinators are built strictly left-to-right, so
//! `a or b and c` is `And(Or(a, b), c)`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The comparison applied by a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Exact match, or set membership when the value is a list.
    Eq,
    /// Negated `Eq` (`!=` or the `__n` lookup).
    NotEq,
    /// Case-insensitive substring match (`__ic`).
    IContains,
    /// CIDR containment (`within_include`); prefix-typed fields only.
    WithinInclude,
}

impl Operator {
    /// The lookup suffix the source of truth uses for this operator.
    pub fn lookup_suffix(&self) -> &'static str {
        match self {
            Operator::Eq => "",
            Operator::NotEq => "__n",
            Operator::IContains => "__ic",
            Operator::WithinInclude => "__within_include",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::IContains => "__ic=",
            Operator::WithinInclude => "within_include=",
        };
        f.write_str(s)
    }
}

/// The right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    List(Vec<String>),
    Bool(bool),
}

impl FilterValue {
    /// All textual alternatives carried by this value.
    pub fn texts(&self) -> Vec<String> {
        match self {
            FilterValue::Text(t) => vec![t.clone()],
            FilterValue::List(items) => items.clone(),
            FilterValue::Bool(b) => vec![b.to_string()],
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(t) => write!(f, "\"{t}\""),
            FilterValue::List(items) => {
                let quoted: Vec<String> = items.iter().map(|i| format!("\"{i}\"")).collect();
                write!(f, "[{}]", quoted.join(","))
            }
            FilterValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A leaf of the predicate tree: `{field, operator, value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    /// Field or filter name with any lookup suffix removed. Custom fields
    /// keep their `cf_` prefix.
    pub field: String,
    pub operator: Operator,
    pub value: FilterValue,
}

impl Comparison {
    pub fn new(field: impl Into<String>, operator: Operator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Eq => write!(f, "{}={}", self.field, self.value),
            Operator::NotEq => write!(f, "{}!={}", self.field, self.value),
            Operator::IContains => write!(f, "{}__ic={}", self.field, self.value),
            Operator::WithinInclude if self.field == "within_include" => {
                write!(f, "within_include={}", self.value)
            }
            Operator::WithinInclude => write!(f, "{}__within_include={}", self.field, self.value),
        }
    }
}

/// A boolean filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Always true. Produced by an empty expression.
    All,
    Compare(Comparison),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Predicate::All)
    }

    /// Every leaf comparison, left to right.
    pub fn comparisons(&self) -> Vec<&Comparison> {
        let mut out = Vec::new();
        self.collect_comparisons(&mut out);
        out
    }

    fn collect_comparisons<'a>(&'a self, out: &mut Vec<&'a Comparison>) {
        match self {
            Predicate::All => {}
            Predicate::Compare(c) => out.push(c),
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_comparisons(out);
                r.collect_comparisons(out);
            }
        }
    }

    /// Rebuild the tree, replacing every leaf through `f`.
    pub fn try_map<E>(
        self,
        f: &mut impl FnMut(Comparison) -> Result<Comparison, E>,
    ) -> Result<Predicate, E> {
        Ok(match self {
            Predicate::All => Predicate::All,
            Predicate::Compare(c) => Predicate::Compare(f(c)?),
            Predicate::And(l, r) => Predicate::And(Box::new(l.try_map(f)?), Box::new(r.try_map(f)?)),
            Predicate::Or(l, r) => Predicate::Or(Box::new(l.try_map(f)?), Box::new(r.try_map(f)?)),
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::All => f.write_str("*"),
            Predicate::Compare(c) => write!(f, "{c}"),
            Predicate::And(l, r) => write!(f, "({l} and {r})"),
            Predicate::Or(l, r) => write!(f, "({l} or {r})"),
        }
    }
}
