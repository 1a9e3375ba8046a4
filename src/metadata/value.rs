//! Typed configuration values.
//!
//! [`Value`] is the tagged union returned by metadata lookups. It is built
//! from parsed YAML or JSON and keeps enough structure for the resolver's
//! merge rules (lists union, mappings deep-merge, scalars override).

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Ordered mapping of configuration keys to values.
pub type Map = BTreeMap<String, Value>;

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Absent or explicit `null`.
    #[default]
    Nil,
    /// Boolean scalar.
    Bool(bool),
    /// Numeric scalar, kept in its source form.
    Number(serde_yaml::Number),
    /// String scalar.
    String(String),
    /// Sequence of values.
    List(Vec<Value>),
    /// Keyed mapping.
    Mapping(Map),
}

impl Value {
    /// Create an empty mapping.
    pub fn mapping() -> Self {
        Value::Mapping(Map::new())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Map> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key if this value is a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Truthiness used by boolean config flags.
    ///
    /// Nil, `false`, empty strings, empty lists and empty mappings are all
    /// false. The strings `"false"` and `"no"` are false as well.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !(s.is_empty() || s == "false" || s == "no"),
            Value::List(items) => !items.is_empty(),
            Value::Mapping(map) => !map.is_empty(),
        }
    }

    /// Render a scalar or list as a plain string.
    ///
    /// Lists join with spaces, mappings render as space-separated `K=V`
    /// pairs, nil renders empty.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::to_plain_string)
                .collect::<Vec<_>>()
                .join(" "),
            Value::Mapping(map) => map
                .iter()
                .map(|(k, v)| format!("{}={}", k, v.to_plain_string()))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Short name of this value's kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Mapping(_) => "mapping",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Mapping(map)
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Value::Nil,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => Value::Number(n),
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_to_string(k), Value::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Number(i.into())
                } else if let Some(u) = n.as_u64() {
                    Value::Number(u.into())
                } else {
                    Value::Number(n.as_f64().unwrap_or_default().into())
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

/// YAML allows non-string keys (`1: foo`, `true: bar`); tags and versions
/// are commonly written unquoted, so keys are normalized to strings.
fn key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "~".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        Value::from(serde_yaml::from_str::<serde_yaml::Value>(s).unwrap())
    }

    #[test]
    fn converts_nested_yaml() {
        let value = yaml("a:\n  b: [1, two, true]\n  c: ~");
        let inner = value.get("a").unwrap();
        assert_eq!(inner.get("c"), Some(&Value::Nil));
        let list = inner.get("b").unwrap().as_list().unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[1], Value::from("two"));
        assert_eq!(list[2], Value::Bool(true));
    }

    #[test]
    fn numeric_keys_become_strings() {
        let value = yaml("3.4: old\n10: ten");
        assert_eq!(value.get("3.4"), Some(&Value::from("old")));
        assert_eq!(value.get("10"), Some(&Value::from("ten")));
    }

    #[test]
    fn converts_json() {
        let json: serde_json::Value = serde_json::from_str(r#"{"a": [1, "x"], "b": null}"#).unwrap();
        let value = Value::from(json);
        assert_eq!(value.get("b"), Some(&Value::Nil));
        assert_eq!(value.get("a").unwrap().to_plain_string(), "1 x");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from("false").is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(!Value::mapping().is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::from("yes").is_truthy());
    }

    #[test]
    fn plain_string_renders_mappings_as_pairs() {
        let value = yaml("A: 1\nB: two");
        assert_eq!(value.to_plain_string(), "A=1 B=two");
    }

    #[test]
    fn serializes_untagged() {
        let value = yaml("name: demo\ntags: [a, b]");
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"name":"demo","tags":["a","b"]}"#);
    }
}
