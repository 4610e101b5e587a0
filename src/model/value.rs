//! Dynamically-typed metadata value, per the re-architecture note for
//! "runtime introspection" (front matter is dynamically typed in the
//! source planning docs; here it is a tagged union dispatched on explicitly
//! rather than modeled via trait objects or `Any`).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Time(DateTime<Utc>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Template truthiness: nil and empty string are falsy, as is an empty
    /// list/map, `0`, `0.0`, and `false`. Everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Time(_) => true,
        }
    }

    /// Resilient attribute access: missing keys, or indexing into a
    /// non-container/nil value, returns `Value::Null` rather than erroring.
    /// Callers needing the "does this exist" distinction should check the
    /// underlying map directly; templates only ever see this resilient view.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Map(m) => m.get(key).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }

    /// Render as the empty-string-resilient textual form used when a
    /// template interpolates `{{ x }}`.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Time(t) => t.to_rfc3339(),
            Value::List(items) => items
                .iter()
                .map(Value::stringify)
                .collect::<Vec<_>>()
                .join(", "),
            Value::Map(_) => String::new(),
        }
    }

    /// Comparison used by the `sort` filter: nil sorts last, otherwise by
    /// natural ordering within the same variant; cross-variant comparisons
    /// fall back to comparing the stringified form so sort never panics.
    pub fn cmp_for_sort(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match (self, other) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
                (Value::String(a), Value::String(b)) => a.cmp(b),
                (Value::Time(a), Value::Time(b)) => a.cmp(b),
                _ => self.stringify().cmp(&other.stringify()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
    }
}

impl From<toml::Value> for Value {
    fn from(v: toml::Value) -> Self {
        match v {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Int(i),
            toml::Value::Float(f) => Value::Float(f),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(d) => Value::String(d.to_string()),
            toml::Value::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
            toml::Value::Table(t) => {
                Value::Map(t.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(v: serde_yaml::Value) -> Self {
        match v {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(s) => Value::List(s.into_iter().map(Value::from).collect()),
            serde_yaml::Value::Mapping(m) => Value::Map(
                m.into_iter()
                    .filter_map(|(k, v)| {
                        k.as_str().map(|k| (k.to_string(), Value::from(v)))
                    })
                    .collect(),
            ),
            serde_yaml::Value::Tagged(t) => Value::from(t.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_attribute_access_is_resilient() {
        let v = Value::Null;
        assert_eq!(v.get("anything"), Value::Null);
        assert_eq!(v.stringify(), "");
        assert!(!v.is_truthy());
    }

    #[test]
    fn sort_places_nil_last() {
        let mut values = vec![
            Value::Int(3),
            Value::Null,
            Value::Int(1),
            Value::Null,
            Value::Int(2),
        ];
        values.sort_by(|a, b| a.cmp_for_sort(b));
        let rendered: Vec<String> = values.iter().map(|v| v.stringify()).collect();
        assert_eq!(rendered, vec!["1", "2", "3", "", ""]);
    }

    #[test]
    fn map_get_resilient_on_missing_key() {
        let mut m = BTreeMap::new();
        m.insert("title".to_string(), Value::String("Hi".to_string()));
        let v = Value::Map(m);
        assert_eq!(v.get("title").as_str(), Some("Hi"));
        assert!(v.get("missing").is_null());
    }
}
