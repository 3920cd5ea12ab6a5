// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-select
#![deny(unsafe_code)]
#![warn(missing_docs)]

use cwn_core::{Entity, EntityKind, ProfileSelector};
use serde_json::Value;

/// Errors compiling or evaluating a selector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    /// The selector expression does not parse.
    #[error("cannot parse selector `{expr}`: {reason}")]
    Parse {
        /// The offending expression.
        expr: String,
        /// Why it does not parse.
        reason: String,
    },
}

/// The comparison operators of the selector language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectorOp {
    Eq,
    Ne,
    Contains,
    In,
}

/// One compiled selector predicate.
#[derive(Debug, Clone)]
pub struct CompiledSelector {
    /// The source expression, echoed back on rejection.
    pub expr: String,
    kind: Option<EntityKind>,
    path: Vec<String>,
    op: SelectorOp,
    literal: Value,
}

/// Outcome of evaluating a profile's selectors against one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Whether the entity is selected by the profile.
    pub selected: bool,
    /// The selector that rejected the entity, when not selected.
    pub matched_selector: Option<String>,
}

impl Selection {
    /// The always-selected outcome (no selectors configured).
    #[must_use]
    pub fn selected() -> Self {
        Self {
            selected: true,
            matched_selector: None,
        }
    }
}

/// A profile's selectors, compiled once at profile-apply time.
#[derive(Debug, Clone, Default)]
pub struct SelectorSet {
    selectors: Vec<CompiledSelector>,
}

impl SelectorSet {
    /// Compile a profile's selectors.
    ///
    /// # Errors
    ///
    /// [`SelectorError::Parse`] for the first expression that does not
    /// parse; invalid profiles never reach the executor.
    pub fn compile(selectors: &[ProfileSelector]) -> Result<Self, SelectorError> {
        let compiled = selectors
            .iter()
            .map(compile_selector)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            selectors: compiled,
        })
    }

    /// Whether the set has no selectors (and therefore never skips).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Evaluate every applicable selector against the entity view.
    ///
    /// An entity is selected iff all applicable selectors hold; the
    /// first rejecting selector is echoed back.
    #[must_use]
    pub fn select(&self, entity: &Entity) -> Selection {
        let view = entity_view(entity);
        for selector in &self.selectors {
            if let Some(kind) = selector.kind {
                if kind != entity.kind {
                    continue;
                }
            }
            if !evaluate(selector, &view) {
                return Selection {
                    selected: false,
                    matched_selector: Some(selector.expr.clone()),
                };
            }
        }
        Selection::selected()
    }
}

/// The entity view selectors evaluate against: identity fields plus the
/// bare property values as filled by the provider.
#[must_use]
pub fn entity_view(entity: &Entity) -> Value {
    serde_json::json!({
        "kind": entity.kind.as_str(),
        "name": entity.display_name(),
        "upstream_id": entity.upstream_id,
        "provider_id": entity.provider_id,
        "properties": entity.properties.to_json_values(),
    })
}

fn compile_selector(selector: &ProfileSelector) -> Result<CompiledSelector, SelectorError> {
    let expr = selector.expr.trim();
    let parse_err = |reason: &str| SelectorError::Parse {
        expr: selector.expr.clone(),
        reason: reason.to_owned(),
    };

    // Operators are whitespace-delimited; the first match wins.
    let (op, op_token) = if expr.contains(" == ") {
        (SelectorOp::Eq, " == ")
    } else if expr.contains(" != ") {
        (SelectorOp::Ne, " != ")
    } else if expr.contains(" contains ") {
        (SelectorOp::Contains, " contains ")
    } else if expr.contains(" in ") {
        (SelectorOp::In, " in ")
    } else {
        return Err(parse_err("no operator (expected ==, !=, contains, in)"));
    };

    let (lhs, rhs) = expr
        .split_once(op_token)
        .ok_or_else(|| parse_err("malformed expression"))?;
    let path: Vec<String> = lhs.trim().split('.').map(str::to_owned).collect();
    if path.iter().any(String::is_empty) {
        return Err(parse_err("empty path segment"));
    }

    let literal = parse_literal(rhs.trim()).ok_or_else(|| parse_err("bad literal"))?;

    Ok(CompiledSelector {
        expr: selector.expr.clone(),
        kind: selector.kind,
        path,
        op,
        literal,
    })
}

/// Parse a literal: JSON first, then a quoted or bare string.
fn parse_literal(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Some(value);
    }
    let unquoted = raw
        .strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .unwrap_or(raw);
    if unquoted.is_empty() {
        return None;
    }
    Some(Value::String(unquoted.to_owned()))
}

fn evaluate(selector: &CompiledSelector, view: &Value) -> bool {
    let mut cursor = view;
    for segment in &selector.path {
        match cursor.get(segment) {
            Some(next) => cursor = next,
            // Missing paths reject: absent data must not select.
            None => return false,
        }
    }

    match selector.op {
        SelectorOp::Eq => cursor == &selector.literal,
        SelectorOp::Ne => cursor != &selector.literal,
        SelectorOp::Contains => match (cursor, &selector.literal) {
            (Value::Array(items), needle) => items.contains(needle),
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle),
            _ => false,
        },
        SelectorOp::In => match &selector.literal {
            Value::Array(items) => items.contains(cursor),
            _ => false,
        },
    }
}
