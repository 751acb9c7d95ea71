use std::fmt;

/// A document node.
///
/// Scalars are `Null`, `Boolean`, `Integer`, `Float` and `String`; the two
/// containers are `Sequence` and `Mapping`. Every node is exclusively owned
/// by its parent, so cloning a value is always a deep copy.
///
/// # Examples
///
/// ```
/// use cfgweave::{Mapping, Value};
///
/// let mut db = Mapping::new();
/// db.insert("host", Value::from("db.local"));
/// db.insert("port", Value::Integer(5432));
///
/// let doc = Value::Mapping(db);
/// assert_eq!(doc.type_name(), "mapping");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// YAML `~` / JSON `null`
    #[default]
    Null,

    Boolean(bool),

    Integer(i64),

    Float(f64),

    /// UTF-8 string; the only scalar that can carry tokens
    String(String),

    /// Ordered list of values; replaced wholesale by overlays
    Sequence(Vec<Value>),

    /// Ordered map with unique string keys
    Mapping(Mapping),
}

impl Value {
    /// Human-readable type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Sequence(_) | Value::Mapping(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Text used when a scalar is spliced into surrounding text.
    ///
    /// Containers have no textual form and return `None`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(n) => Some(n.to_string()),
            Value::Float(n) => Some(n.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Null => Some("null".to_string()),
            Value::Sequence(_) | Value::Mapping(_) => None,
        }
    }

    /// Recursive merge: where both sides are mappings keys are unioned with
    /// `incoming` winning conflicts, otherwise `incoming` replaces `self`.
    pub fn overlay(&mut self, incoming: Value) {
        match (self, incoming) {
            (Value::Mapping(base), Value::Mapping(top)) => base.overlay(top),
            (slot, other) => *slot = other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => write!(f, "{:?}", self),
        }
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

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

/// Insertion-ordered mapping with unique keys.
///
/// Key order is meaningful: it drives search order and visit order, and
/// equality is order-sensitive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Insert or replace. A replaced key keeps its position; a new key is
    /// appended. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.position(key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Recursive union: existing keys keep their position, new keys are
    /// appended, incoming values win conflicts.
    pub fn overlay(&mut self, incoming: Mapping) {
        for (key, value) in incoming.entries {
            match self.get_mut(&key) {
                Some(slot) => slot.overlay(value),
                None => self.entries.push((key, value)),
            }
        }
    }

    /// Rename `from` to `to` in place.
    ///
    /// When `to` already exists the renamed value is overlaid onto it and
    /// `from` disappears.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return false;
        }
        let Some(index) = self.position(from) else {
            return false;
        };
        if self.contains_key(to) {
            let (_, value) = self.entries.remove(index);
            if let Some(slot) = self.get_mut(to) {
                slot.overlay(value);
            }
        } else {
            self.entries[index].0 = to.to_string();
        }
        true
    }

    /// Replace `key` by the entries of `contents`, inserted at the key's
    /// position. Entries whose keys already exist elsewhere are overlaid
    /// onto those keys instead.
    pub fn splice(&mut self, key: &str, contents: Mapping) -> bool {
        let Some(mut cursor) = self.position(key) else {
            return false;
        };
        self.entries.remove(cursor);
        for (k, v) in contents.entries {
            match self.get_mut(&k) {
                Some(slot) => slot.overlay(v),
                None => {
                    self.entries.insert(cursor, (k, v));
                    cursor += 1;
                }
            }
        }
        true
    }
}

impl FromIterator<(String, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut mapping = Mapping::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

impl<'a> FromIterator<(&'a str, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (&'a str, Value)>>(iter: I) -> Self {
        iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
