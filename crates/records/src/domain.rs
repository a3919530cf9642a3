//! Search domains: prefix-notation filter lists such as
//! `["|", ["name", "ilike", "%desk%"], ["name", "ilike", "%chair%"]]`.
//!
//! Models often emit slightly malformed domains (a bare leaf instead of a
//! list of leaves, or an extra level of nesting). [`normalize_domain`]
//! repairs those shapes on the raw JSON before [`parse_domain`] turns the
//! result into typed terms.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::store::{StoreError, StoreResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
    NotLike,
    ILike,
    NotILike,
    EqLike,
    EqILike,
    In,
    NotIn,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::ILike => "ilike",
            Operator::NotILike => "not ilike",
            Operator::EqLike => "=like",
            Operator::EqILike => "=ilike",
            Operator::In => "in",
            Operator::NotIn => "not in",
        }
    }
}

impl FromStr for Operator {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        let op = match s.trim().to_lowercase().as_str() {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Le,
            ">=" => Operator::Ge,
            "like" => Operator::Like,
            "not like" => Operator::NotLike,
            "ilike" => Operator::ILike,
            "not ilike" => Operator::NotILike,
            "=like" => Operator::EqLike,
            "=ilike" => Operator::EqILike,
            "in" => Operator::In,
            "not in" => Operator::NotIn,
            other => {
                return Err(StoreError::InvalidDomain(format!(
                    "unknown operator '{other}'"
                )))
            }
        };
        Ok(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `[field, operator, value]` leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

/// One item of a parsed domain, still in prefix order.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainTerm {
    And,
    Or,
    Not,
    Leaf(Condition),
}

/// Tree form of a domain, used by stores that evaluate domains themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainExpr {
    And(Box<DomainExpr>, Box<DomainExpr>),
    Or(Box<DomainExpr>, Box<DomainExpr>),
    Not(Box<DomainExpr>),
    Leaf(Condition),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Normalization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn is_logical(v: &Value) -> bool {
    matches!(v.as_str(), Some("&" | "|" | "!"))
}

/// `[field, operator, value]` with a string field that is not a logical
/// operator. The value may itself be a list (`["id", "in", [1, 2]]`).
fn is_leaf(v: &Value) -> bool {
    match v.as_array() {
        Some(items) if items.len() == 3 => {
            items[0].is_string() && !is_logical(&items[0]) && items[1].is_string()
        }
        _ => false,
    }
}

/// Bring a raw search-domain value into canonical form: a list whose items
/// are logical operators or three-element leaves.
///
/// - `null` → `[]`
/// - a bare leaf `[f, op, v]` → `[[f, op, v]]`
/// - `[[t1, t2, ...]]` (a single item that is a list of terms) → `[t1, t2, ...]`
///
/// Applying it to its own output returns the same value.
pub fn normalize_domain(raw: &Value) -> Value {
    let mut current = match raw {
        Value::Null => return Value::Array(Vec::new()),
        other => other.clone(),
    };
    loop {
        if is_leaf(&current) {
            return Value::Array(vec![current]);
        }
        let Value::Array(items) = &current else {
            return current;
        };
        match items.as_slice() {
            [only] if only.is_array() && !is_leaf(only) => current = only.clone(),
            _ => return current,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a canonical domain into terms and check operator arity.
pub fn parse_domain(value: &Value) -> StoreResult<Vec<DomainTerm>> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(StoreError::InvalidDomain(format!(
                "expected a list of conditions, got {other}"
            )))
        }
    };

    let mut terms = Vec::with_capacity(items.len());
    for item in items {
        let term = match item {
            Value::String(s) if s == "&" => DomainTerm::And,
            Value::String(s) if s == "|" => DomainTerm::Or,
            Value::String(s) if s == "!" => DomainTerm::Not,
            Value::Array(parts) => DomainTerm::Leaf(parse_condition(parts)?),
            other => {
                return Err(StoreError::InvalidDomain(format!(
                    "unexpected domain item {other}"
                )))
            }
        };
        terms.push(term);
    }

    build_expr(&terms)?;
    Ok(terms)
}

fn parse_condition(parts: &[Value]) -> StoreResult<Condition> {
    let [field, op, value] = parts else {
        return Err(StoreError::InvalidDomain(format!(
            "condition must have 3 elements, got {}",
            parts.len()
        )));
    };
    let field = field
        .as_str()
        .ok_or_else(|| StoreError::InvalidDomain(format!("field name must be a string, got {field}")))?;
    let op = op
        .as_str()
        .ok_or_else(|| StoreError::InvalidDomain(format!("operator must be a string, got {op}")))?;
    Ok(Condition {
        field: field.to_owned(),
        operator: op.parse()?,
        value: value.clone(),
    })
}

/// Longest domain accepted. Bounds the depth of the folded tree.
pub const MAX_DOMAIN_TERMS: usize = 256;

/// Fold prefix terms into a tree. Consecutive top-level expressions are
/// joined with an implicit AND. `None` means "match everything".
pub fn build_expr(terms: &[DomainTerm]) -> StoreResult<Option<DomainExpr>> {
    if terms.len() > MAX_DOMAIN_TERMS {
        return Err(StoreError::InvalidDomain(format!(
            "domain has {} terms, at most {MAX_DOMAIN_TERMS} are allowed",
            terms.len()
        )));
    }
    let mut pos = 0;
    let mut result: Option<DomainExpr> = None;
    while pos < terms.len() {
        let expr = parse_expr(terms, &mut pos)?;
        result = Some(match result {
            Some(prev) => DomainExpr::And(Box::new(prev), Box::new(expr)),
            None => expr,
        });
    }
    Ok(result)
}

fn parse_expr(terms: &[DomainTerm], pos: &mut usize) -> StoreResult<DomainExpr> {
    let term = terms.get(*pos).ok_or_else(|| {
        StoreError::InvalidDomain("logical operator is missing an operand".into())
    })?;
    *pos += 1;
    Ok(match term {
        DomainTerm::Leaf(c) => DomainExpr::Leaf(c.clone()),
        DomainTerm::Not => DomainExpr::Not(Box::new(parse_expr(terms, pos)?)),
        DomainTerm::And => {
            let a = parse_expr(terms, pos)?;
            let b = parse_expr(terms, pos)?;
            DomainExpr::And(Box::new(a), Box::new(b))
        }
        DomainTerm::Or => {
            let a = parse_expr(terms, pos)?;
            let b = parse_expr(terms, pos)?;
            DomainExpr::Or(Box::new(a), Box::new(b))
        }
    })
}
