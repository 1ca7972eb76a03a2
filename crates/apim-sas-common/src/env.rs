//! Resolves `${NAME}` and `$NAME` placeholders in configuration values.
//!
//! Resolution is a single pass over a parsed document, run once at load
//! time. `$$` produces a literal `$`. A placeholder naming an unset
//! variable is an error rather than being left in place, so a key such as
//! `"${APIM_KEY}"` can never be used verbatim as signing material.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::{Error, Result};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\$|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .unwrap_or_else(|e| unreachable!("placeholder pattern is valid: {e}"))
});

/// Resolves placeholders in every string of `value` against the process environment.
///
/// # Errors
///
/// Returns [`Error::Config`] naming the first variable that is not set.
pub fn resolve(value: Value) -> Result<Value> {
    resolve_with(value, &|name| std::env::var(name).ok())
}

/// Resolves placeholders using a caller-supplied lookup.
///
/// Object keys are left untouched; only string values are rewritten.
///
/// # Errors
///
/// Returns [`Error::Config`] naming the first variable the lookup cannot resolve.
pub fn resolve_with(value: Value, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Value> {
    Ok(match value {
        Value::String(s) => Value::String(expand(&s, lookup)?),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| resolve_with(item, lookup))
                .collect::<Result<_>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| Ok((k, resolve_with(v, lookup)?)))
                .collect::<Result<_>>()?,
        ),
        other => other,
    })
}

/// Expands placeholders in a single string.
///
/// # Errors
///
/// Returns [`Error::Config`] if a referenced variable cannot be resolved.
pub fn expand(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String> {
    let mut missing = None;

    let expanded = PLACEHOLDER.replace_all(input, |caps: &Captures<'_>| {
        let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
            return "$".to_string();
        };
        lookup(name.as_str()).unwrap_or_else(|| {
            missing.get_or_insert_with(|| name.as_str().to_string());
            String::new()
        })
    });

    match missing {
        Some(name) => Err(Error::Config(format!(
            "environment variable '{name}' referenced in configuration is not set"
        ))),
        None => Ok(expanded.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "APIM_KEY" => Some("s3cr3t".to_string()),
            "REGION" => Some("westeurope".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_braced_and_bare() {
        assert_eq!(expand("${APIM_KEY}", &lookup).unwrap(), "s3cr3t");
        assert_eq!(expand("$APIM_KEY", &lookup).unwrap(), "s3cr3t");
        assert_eq!(
            expand("https://x.${REGION}.example/", &lookup).unwrap(),
            "https://x.westeurope.example/"
        );
    }

    #[test]
    fn test_expand_leaves_plain_text_alone() {
        assert_eq!(expand("no placeholders", &lookup).unwrap(), "no placeholders");
        assert_eq!(expand("trailing $", &lookup).unwrap(), "trailing $");
        assert_eq!(expand("price: $5", &lookup).unwrap(), "price: $5");
    }

    #[test]
    fn test_double_dollar_is_literal() {
        assert_eq!(expand("$$APIM_KEY", &lookup).unwrap(), "$APIM_KEY");
    }

    #[test]
    fn test_missing_variable_is_config_error() {
        let err = expand("${NOT_SET_ANYWHERE}", &lookup).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("NOT_SET_ANYWHERE")));
    }

    #[test]
    fn test_resolve_walks_nested_values() {
        let doc = json!({
            "apim": {
                "id": "integration",
                "key": "${APIM_KEY}",
                "tags": ["$REGION", 7, true],
            }
        });

        let resolved = resolve_with(doc, &lookup).unwrap();
        assert_eq!(resolved["apim"]["key"], "s3cr3t");
        assert_eq!(resolved["apim"]["tags"][0], "westeurope");
        assert_eq!(resolved["apim"]["tags"][1], 7);
    }

    #[test]
    fn test_resolve_does_not_touch_keys() {
        let doc = json!({ "$REGION": "value" });
        let resolved = resolve_with(doc, &lookup).unwrap();
        assert_eq!(resolved["$REGION"], "value");
    }
}
