// SPDX-License-Identifier: MIT OR Apache-2.0

//! Endpoint and body templating.
//!
//! Templates substitute `{dotted.path}` placeholders from a JSON context
//! of `{entity, params}`. Rendering is strict: an unresolvable path, a
//! non-scalar value, or a sensitive-looking key is a fatal template
//! error — endpoints must never leak secret material.

use cwn_core::Entity;
use serde_json::Value;

/// Property-key fragments that must never be rendered into an endpoint.
const SENSITIVE_KEY_FRAGMENTS: &[&str] = &["token", "secret", "password", "api_key"];

/// Errors rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A `{placeholder}` was not terminated.
    #[error("unterminated placeholder in template")]
    Unterminated,

    /// The placeholder path did not resolve in the context.
    #[error("unknown template path: {path}")]
    UnknownPath {
        /// The unresolved path.
        path: String,
    },

    /// The placeholder resolved to an object, array, or null.
    #[error("template path {path} is not a scalar")]
    NotScalar {
        /// The offending path.
        path: String,
    },

    /// The placeholder path names sensitive material.
    #[error("template path {path} may carry secret material")]
    Sensitive {
        /// The rejected path.
        path: String,
    },
}

/// Build the rendering context for one rule evaluation.
#[must_use]
pub fn context(entity: &Entity, params: &Value) -> Value {
    serde_json::json!({
        "entity": {
            "id": entity.id,
            "upstream_id": entity.upstream_id,
            "kind": entity.kind.as_str(),
            "name": entity.display_name(),
            "properties": entity.properties.to_json_values(),
        },
        "params": params,
    })
}

/// Render `template` against `context`.
///
/// # Errors
///
/// Any [`TemplateError`] is fatal to the rule: partial URLs are worse
/// than no request.
pub fn render(template: &str, context: &Value) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or(TemplateError::Unterminated)?;
        let path = after[..close].trim();
        out.push_str(&resolve(path, context)?);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Resolve one dotted path to a scalar string.
fn resolve(path: &str, context: &Value) -> Result<String, TemplateError> {
    let lowered = path.to_lowercase();
    if SENSITIVE_KEY_FRAGMENTS.iter().any(|f| lowered.contains(f)) {
        return Err(TemplateError::Sensitive {
            path: path.to_owned(),
        });
    }

    let mut cursor = context;
    for segment in path.split('.') {
        cursor = cursor.get(segment).ok_or_else(|| TemplateError::UnknownPath {
            path: path.to_owned(),
        })?;
    }

    match cursor {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(TemplateError::NotScalar {
            path: path.to_owned(),
        }),
    }
}
