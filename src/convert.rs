//! YAML/JSON <-> document conversion utilities

use crate::{
    error::Result,
    tree::Tree,
    value::{Mapping, Value},
};

/// Convert serde_json::Value to a document value
pub fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => {
            Value::Sequence(arr.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(obj) => Value::Mapping(
            obj.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
    }
}

/// Convert a document value to serde_json::Value
pub fn value_to_json(v: Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(b),
        Value::Integer(i) => serde_json::Value::Number(i.into()),
        Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s),
        Value::Sequence(items) => {
            serde_json::Value::Array(items.into_iter().map(value_to_json).collect())
        }
        Value::Mapping(m) => serde_json::Value::Object(
            m.into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
    }
}

/// Convert serde_yaml::Value to a document value.
///
/// Non-string keys are stringified and tags are dropped.
pub fn yaml_to_value(v: serde_yaml::Value) -> Value {
    match v {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Boolean(b),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Sequence(items.into_iter().map(yaml_to_value).collect())
        }
        serde_yaml::Value::Mapping(m) => Value::Mapping(
            m.into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_value(v)))
                .collect::<Mapping>(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_value(tagged.value),
    }
}

/// Convert a document value to serde_yaml::Value
pub fn value_to_yaml(v: Value) -> serde_yaml::Value {
    match v {
        Value::Null => serde_yaml::Value::Null,
        Value::Boolean(b) => serde_yaml::Value::Bool(b),
        Value::Integer(i) => serde_yaml::Value::Number(i.into()),
        Value::Float(f) => serde_yaml::Value::Number(f.into()),
        Value::String(s) => serde_yaml::Value::String(s),
        Value::Sequence(items) => {
            serde_yaml::Value::Sequence(items.into_iter().map(value_to_yaml).collect())
        }
        Value::Mapping(m) => serde_yaml::Value::Mapping(
            m.into_iter()
                .map(|(k, v)| (serde_yaml::Value::String(k), value_to_yaml(v)))
                .collect(),
        ),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Parse YAML text into a value. An empty document is `Null`.
pub fn value_from_yaml_str(s: &str) -> Result<Value> {
    if s.trim().is_empty() {
        return Ok(Value::Null);
    }
    let parsed: serde_yaml::Value = serde_yaml::from_str(s)?;
    Ok(yaml_to_value(parsed))
}

pub fn value_from_json_str(s: &str) -> Result<Value> {
    let parsed: serde_json::Value = serde_json::from_str(s)?;
    Ok(json_to_value(parsed))
}

/// Build a tree from a parsed document. `Null` gives an empty tree.
pub fn tree_from_value(value: Value) -> Result<Tree> {
    match value {
        Value::Null => Ok(Tree::new()),
        other => Ok(Tree::try_from(other)?),
    }
}

/// Parse YAML text into a tree; the document must be a mapping.
///
/// # Examples
///
/// ```
/// use cfgweave::convert;
///
/// let tree = convert::from_yaml_str("host: db.local\nport: 5432").unwrap();
/// assert_eq!(tree.keys("").unwrap(), vec!["host", "port"]);
/// assert!(convert::from_yaml_str("- a\n- b").is_err());
/// ```
pub fn from_yaml_str(s: &str) -> Result<Tree> {
    tree_from_value(value_from_yaml_str(s)?)
}

pub fn from_json_str(s: &str) -> Result<Tree> {
    tree_from_value(value_from_json_str(s)?)
}

#[test]
fn test_yaml_key_order_is_preserved() {
    let tree = from_yaml_str("z: 1\na: 2\nm: 3").unwrap();
    assert_eq!(tree.keys("").unwrap(), vec!["z", "a", "m"]);
}

#[test]
fn test_json_key_order_is_preserved() {
    let tree = from_json_str(r#"{"z": 1, "a": {"y": true, "b": null}}"#).unwrap();
    assert_eq!(tree.keys("").unwrap(), vec!["z", "a"]);
    assert_eq!(tree.keys("a").unwrap(), vec!["y", "b"]);
}

#[test]
fn test_non_string_yaml_keys_are_stringified() {
    let tree = from_yaml_str("1: one\ntrue: yes").unwrap();
    assert_eq!(tree.keys("").unwrap(), vec!["1", "true"]);
}
