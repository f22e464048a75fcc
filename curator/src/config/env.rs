//! Environment-variable substitution for YAML documents.
//!
//! A scalar node whose entire value is `${VAR}` or `${VAR:default}` is
//! replaced before typed deserialization. Embedded substitution inside a
//! larger string is deliberately not supported; the whole scalar or
//! nothing.

use serde_yaml::Value;

/// Substitute `${VAR}` / `${VAR:default}` scalars throughout a YAML tree.
///
/// `lookup` abstracts `std::env::var` so tests stay hermetic. Unset
/// variables without a default leave the node untouched.
pub fn substitute_env(value: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => {
            if let Some(replacement) = resolve(s, lookup) {
                *value = reparse_scalar(&replacement);
            }
        }
        Value::Sequence(seq) => {
            for item in seq {
                substitute_env(item, lookup);
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                substitute_env(item, lookup);
            }
        }
        _ => {}
    }
}

/// Apply substitution with the process environment.
pub fn substitute_process_env(value: &mut Value) {
    substitute_env(value, &|name| std::env::var(name).ok());
}

fn resolve(scalar: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    let inner = scalar.strip_prefix("${")?.strip_suffix('}')?;
    // Embedded closers mean this was not a whole-scalar substitution.
    if inner.contains('}') || inner.is_empty() {
        return None;
    }
    match inner.split_once(':') {
        Some((name, default)) => Some(lookup(name).unwrap_or_else(|| default.to_string())),
        None => lookup(inner),
    }
}

/// Substituted values keep YAML scalar typing: numbers and booleans come
/// back as numbers and booleans, everything else stays a string.
fn reparse_scalar(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    Value::String(raw.to_string())
}
