// value.rs — Tagged runtime values for condition evaluation.
//
// Context payloads arrive as loosely-typed JSON. Rather than comparing
// `serde_json::Value`s with implicit coercion, everything is converted
// into this explicit tagged type so the evaluator's type-mismatch errors
// are well-defined.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A runtime value: string, number, boolean, null, list, or nested mapping.
///
/// Numbers are uniformly `f64` — condition literals and JSON payload
/// numbers share one representation, so `payload.amount > 10000` compares
/// numerically regardless of how the payload spelled the number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// The type name used in error messages ("string", "number", ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "mapping",
        }
    }

    /// Flatten this value into dotted keys under `prefix`.
    ///
    /// Maps recurse (`payload.user.role`); every other value is inserted
    /// as-is. This is how a context payload becomes the flat namespace the
    /// evaluator reads.
    pub fn flatten_into(&self, prefix: &str, out: &mut BTreeMap<String, Value>) {
        match self {
            Value::Map(entries) => {
                for (key, value) in entries {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    value.flatten_into(&path, out);
                }
            }
            other => {
                out.insert(prefix.to_string(), other.clone());
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Num(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => write!(f, "{{{} entries}}", entries.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_conversion_preserves_structure() {
        let json: serde_json::Value = serde_json::json!({
            "amount": 50000,
            "approved": false,
            "tags": ["a", "b"],
            "user": { "role": "guest" }
        });
        let value = Value::from(json);

        let mut flat = BTreeMap::new();
        value.flatten_into("payload", &mut flat);

        assert_eq!(flat.get("payload.amount"), Some(&Value::Num(50000.0)));
        assert_eq!(flat.get("payload.approved"), Some(&Value::Bool(false)));
        assert_eq!(
            flat.get("payload.user.role"),
            Some(&Value::Str("guest".into()))
        );
        // Lists are leaf values, not flattened further.
        assert!(matches!(flat.get("payload.tags"), Some(Value::List(_))));
    }

    #[test]
    fn flatten_empty_prefix_uses_bare_keys() {
        let mut entries = BTreeMap::new();
        entries.insert("id".to_string(), Value::Str("a1".into()));
        let mut flat = BTreeMap::new();
        Value::Map(entries).flatten_into("", &mut flat);
        assert_eq!(flat.get("id"), Some(&Value::Str("a1".into())));
    }

    #[test]
    fn type_names_for_errors() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Num(1.0).type_name(), "number");
        assert_eq!(Value::Str("x".into()).type_name(), "string");
    }

    #[test]
    fn display_quotes_strings() {
        assert_eq!(format!("{}", Value::Str("eu".into())), "\"eu\"");
        assert_eq!(format!("{}", Value::Num(3.0)), "3");
    }
}
