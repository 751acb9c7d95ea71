//! Key-name driven coercion of resolved scalars into typed values.
//!
//! Rules are registered under a name with a regex matched against the key;
//! a key matching more than one rule is a configuration error rather than a
//! silent pick.
//!
//! | Rule | Key pattern | Result |
//! |---|---|---|
//! | `bool` | `is-x`, `use-x` | [`Typed::Bool`] |
//! | `path` | `x-path`, `x-dir` | [`Typed::Path`] |
//! | `url` | `x-url` | [`Typed::Url`] |

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::{
    error::{Error, Result},
    keychain::is_valid_key,
    lexer,
    tree::Tree,
    value::Value,
};

pub const TRUE_VALUES: [&str; 11] = [
    "y", "Y", "yes", "Yes", "YES", "true", "True", "TRUE", "on", "On", "ON",
];
pub const FALSE_VALUES: [&str; 11] = [
    "n", "N", "no", "No", "NO", "false", "False", "FALSE", "off", "Off", "OFF",
];

const KEY: &str = r"[a-zA-Z0-9_][a-zA-Z0-9_.-]*";

/// Parse a boolean spelled in any of the accepted forms.
pub fn parse_bool(s: &str) -> Option<bool> {
    if TRUE_VALUES.contains(&s) {
        Some(true)
    } else if FALSE_VALUES.contains(&s) {
        Some(false)
    } else {
        None
    }
}

/// True for boolean-typed keys (`is-...`, `use-...`).
pub fn is_bool_key(key: &str) -> bool {
    key.strip_prefix("use-")
        .or_else(|| key.strip_prefix("is-"))
        .is_some_and(is_valid_key)
}

/// A coerced value.
#[derive(Debug, Clone, PartialEq)]
pub enum Typed {
    /// No rule matched
    Plain(Value),
    Bool(bool),
    Path(PathBuf),
    Url(Url),
}

impl fmt::Display for Typed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Typed::Plain(value) => write!(f, "{}", value),
            Typed::Bool(b) => write!(f, "{}", b),
            Typed::Path(path) => write!(f, "{}", path.display()),
            Typed::Url(url) => write!(f, "{}", url),
        }
    }
}

pub type CoerceFn = Box<dyn Fn(&Value) -> std::result::Result<Typed, String> + Send + Sync>;

struct Rule {
    name: String,
    pattern: Regex,
    handler: CoerceFn,
}

/// Registry of key pattern → coercion handler.
///
/// # Examples
///
/// ```
/// use cfgweave::{CoercionRegistry, Typed, Value};
///
/// let registry = CoercionRegistry::with_defaults();
/// assert_eq!(registry.coerce("use-tls", &Value::from("yes")).unwrap(), Typed::Bool(true));
/// assert_eq!(registry.coerce("host", &Value::from("h")).unwrap(), Typed::Plain(Value::from("h")));
/// ```
#[derive(Default)]
pub struct CoercionRegistry {
    rules: Vec<Rule>,
}

impl CoercionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `bool`, `path` and `url` rules.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: [(&str, String, CoerceFn); 3] = [
            (
                "bool",
                format!("^(?:use|is)-{KEY}$"),
                Box::new(|value: &Value| match value {
                    Value::Boolean(b) => Ok(Typed::Bool(*b)),
                    Value::String(s) => parse_bool(s)
                        .map(Typed::Bool)
                        .ok_or_else(|| format!("'{}' is not a recognized boolean", s)),
                    other => Err(format!("cannot read a {} as a boolean", other.type_name())),
                }),
            ),
            (
                "path",
                format!("^{KEY}-(?:path|dir)$"),
                Box::new(|value: &Value| scalar_text(value).map(|s| Typed::Path(PathBuf::from(s)))),
            ),
            (
                "url",
                format!("^{KEY}-url$"),
                Box::new(|value: &Value| {
                    let text = scalar_text(value)?;
                    Url::parse(&text).map(Typed::Url).map_err(|e| e.to_string())
                }),
            ),
        ];
        for (name, pattern, handler) in defaults {
            if let Ok(pattern) = Regex::new(&pattern) {
                registry.rules.push(Rule {
                    name: name.to_string(),
                    pattern,
                    handler,
                });
            }
        }
        registry
    }

    /// Register `handler` for keys matching `pattern`.
    pub fn register<F>(&mut self, name: &str, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&Value) -> std::result::Result<Typed, String> + Send + Sync + 'static,
    {
        if self.rules.iter().any(|rule| rule.name == name) {
            return Err(Error::Registration {
                message: format!("coercion rule '{}' is already registered", name),
            });
        }
        let pattern = Regex::new(pattern).map_err(|e| Error::Registration {
            message: format!("coercion rule '{}': {}", name, e),
        })?;
        self.rules.push(Rule {
            name: name.to_string(),
            pattern,
            handler: Box::new(handler),
        });
        Ok(())
    }

    /// Names of the rules matching `key`.
    pub fn matching(&self, key: &str) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|rule| rule.pattern.is_match(key))
            .map(|rule| rule.name.as_str())
            .collect()
    }

    pub fn coerce(&self, key: &str, value: &Value) -> Result<Typed> {
        let mut matches = self.rules.iter().filter(|rule| rule.pattern.is_match(key));
        let Some(rule) = matches.next() else {
            return Ok(Typed::Plain(value.clone()));
        };
        if matches.next().is_some() {
            return Err(Error::AmbiguousCoercion {
                key: key.to_string(),
                rules: self.matching(key).into_iter().map(str::to_string).collect(),
            });
        }
        (rule.handler)(value).map_err(|message| Error::Coercion {
            key: key.to_string(),
            message,
        })
    }
}

impl fmt::Debug for CoercionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| (&rule.name, rule.pattern.as_str())))
            .finish()
    }
}

fn scalar_text(value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::Null => Err("value is null".to_string()),
        other => other
            .to_text()
            .ok_or_else(|| format!("cannot read a {} as text", other.type_name())),
    }
}

/// Attribute name derived from a key: `_db-host.name` → `DB_HOST_NAME`.
pub fn attribute_name(key: &str) -> String {
    key.trim_start_matches('_')
        .to_ascii_uppercase()
        .replace(['-', '.'], "_")
}

/// Typed "config attributes" of an expanded tree, one per leaf key.
///
/// The deepest occurrence of a key wins (the earliest one at equal depth),
/// and leaves still holding variable tokens are skipped. A value its rule
/// rejects is returned as [`Typed::Plain`]; an ambiguous key is an error.
pub fn attributes(tree: &Tree, registry: &CoercionRegistry) -> Result<BTreeMap<String, Typed>> {
    let mut chosen: BTreeMap<String, (usize, String, Value)> = BTreeMap::new();

    for (keychain, value) in tree.flatten(true) {
        let Some(key) = keychain.last() else {
            continue;
        };
        if let Value::String(s) = &value
            && lexer::tokens(s).iter().any(|t| t.is_variable())
        {
            continue;
        }
        let name = attribute_name(key);
        let depth = keychain.len();
        if chosen.get(&name).is_some_and(|(d, _, _)| *d >= depth) {
            continue;
        }
        chosen.insert(name, (depth, key.trim_start_matches('_').to_string(), value));
    }

    let mut attributes = BTreeMap::new();
    for (name, (_, key, value)) in chosen {
        // a value its rule rejects is kept as it is
        let typed = match registry.coerce(&key, &value) {
            Ok(typed) => typed,
            Err(err @ Error::AmbiguousCoercion { .. }) => return Err(err),
            Err(err) => {
                debug!(key = key.as_str(), %err, "coercion failed, keeping plain value");
                Typed::Plain(value)
            }
        };
        attributes.insert(name, typed);
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::from_yaml_str;

    #[test]
    fn test_default_rules() {
        let registry = CoercionRegistry::with_defaults();
        assert_eq!(
            registry.coerce("cache-dir", &Value::from("/tmp/c")).unwrap(),
            Typed::Path(PathBuf::from("/tmp/c"))
        );
        assert!(matches!(
            registry.coerce("api-url", &Value::from("https://example.com/v1")).unwrap(),
            Typed::Url(_)
        ));
        assert!(registry.coerce("api-url", &Value::from("not a url")).is_err());
        assert!(registry.coerce("is-prod", &Value::from("maybe")).is_err());
    }

    #[test]
    fn test_ambiguous_rules_are_an_error() {
        let registry = CoercionRegistry::with_defaults();
        let err = registry.coerce("use-cache-dir", &Value::from("x")).unwrap_err();
        assert!(matches!(err, Error::AmbiguousCoercion { .. }));
    }

    #[test]
    fn test_register_rejects_duplicates_and_bad_patterns() {
        let mut registry = CoercionRegistry::with_defaults();
        assert!(registry.register("bool", "^x$", |v| Ok(Typed::Plain(v.clone()))).is_err());
        assert!(registry.register("broken", "(", |v| Ok(Typed::Plain(v.clone()))).is_err());
        assert!(registry.register("port", "^port$", |v| Ok(Typed::Plain(v.clone()))).is_ok());
    }

    #[test]
    fn test_attributes_deepest_wins() {
        let tree = from_yaml_str(
            "host: top\nsvc:\n  db:\n    host: deep\n_use-tls: yes\nurl: ))missing\n",
        )
        .unwrap();
        let attrs = attributes(&tree, &CoercionRegistry::with_defaults()).unwrap();
        assert_eq!(attrs.get("HOST"), Some(&Typed::Plain(Value::from("deep"))));
        assert_eq!(attrs.get("USE_TLS"), Some(&Typed::Bool(true)));
        assert!(!attrs.contains_key("URL"));
    }

    #[test]
    fn test_attributes_keep_values_a_rule_rejects() {
        let tree = from_yaml_str("is-debug: maybe
home-url: not a url
use-tls: on
").unwrap();
        let attrs = attributes(&tree, &CoercionRegistry::with_defaults()).unwrap();
        assert_eq!(attrs.get("IS_DEBUG"), Some(&Typed::Plain(Value::from("maybe"))));
        assert_eq!(attrs.get("HOME_URL"), Some(&Typed::Plain(Value::from("not a url"))));
        assert_eq!(attrs.get("USE_TLS"), Some(&Typed::Bool(true)));

        let ambiguous = from_yaml_str("use-cache-dir: x
").unwrap();
        assert!(matches!(
            attributes(&ambiguous, &CoercionRegistry::with_defaults()),
            Err(Error::AmbiguousCoercion { .. })
        ));
    }
}
