use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::{
    ast::{CompareOp, Condition, TokenKind},
    coerce::{is_bool_key, parse_bool},
    error::{Error, Result, TreeError},
    keychain::Keychain,
    lexer,
    parser::parse_condition,
    tree::Tree,
    value::Value,
};

use super::{Env, Transformer, TransformerKind, collect_keys, imports, rewrite_leaves};

/// Gates subtrees under `?{condition}` keys.
///
/// A true condition splices the subtree into the parent at the key's
/// position; a false one removes it.
///
/// ```text
/// use-tls: yes                use-tls: yes
/// ?{use-tls}:          =>     port: 443
///   port: 443
/// ```
pub struct KeyConditionals;

/// Resolves `?{condition:then}` and `?{condition:then:else}` in values.
/// A false condition without an else branch gives an empty string.
pub struct Conditionals;

/// The condition of a key that is exactly `?{condition}` or `?{condition}/`.
pub(crate) fn conditional_key(key: &str) -> Option<String> {
    let body = key.strip_suffix('/').unwrap_or(key);
    match lexer::whole_token(body)?.kind {
        TokenKind::Conditional {
            condition,
            then: None,
            ..
        } => Some(condition),
        _ => None,
    }
}

enum Lookup {
    Absent,
    Found(Value),
    /// Not decidable yet: the key may still appear or change.
    Deferred,
}

/// Three-valued evaluation of conditions against a tree; `None` defers the
/// decision to a later pass.
pub(crate) struct Evaluator<'a> {
    tree: &'a Tree,
    context: Option<&'a Tree>,
    imports_pending: bool,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(tree: &'a Tree, context: Option<&'a Tree>, imports_pending: bool) -> Self {
        Evaluator {
            tree,
            context,
            imports_pending,
        }
    }

    fn lookup(&self, key: &Keychain) -> Lookup {
        let contents = key.with_trailing(true);
        let found = self
            .tree
            .get(&contents)
            .ok()
            .or_else(|| self.context.and_then(|ctx| ctx.get(&contents).ok()));
        match found {
            Some(value) if holds_tokens(&value) => Lookup::Deferred,
            Some(value) => Lookup::Found(value),
            None if self.imports_pending => Lookup::Deferred,
            None => Lookup::Absent,
        }
    }

    pub(crate) fn evaluate(&self, condition: &Condition) -> Option<bool> {
        match condition {
            Condition::Present(key) => match self.lookup(key) {
                Lookup::Absent => Some(false),
                Lookup::Deferred => None,
                Lookup::Found(value) if key.last().is_some_and(is_bool_key) => Some(truthy(&value)),
                Lookup::Found(_) => Some(true),
            },
            Condition::Compare { key, op, literal } => {
                let equal = match self.lookup(key) {
                    Lookup::Absent => false,
                    Lookup::Deferred => return None,
                    Lookup::Found(value) => values_equal(&value, literal),
                };
                Some(equal == (*op == CompareOp::Equal))
            }
            Condition::Not(inner) => self.evaluate(inner).map(|b| !b),
            Condition::And(left, right) => match (self.evaluate(left), self.evaluate(right)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Condition::Or(left, right) => match (self.evaluate(left), self.evaluate(right)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
        }
    }
}

fn holds_tokens(value: &Value) -> bool {
    match value {
        Value::String(s) => lexer::has_tokens(s),
        Value::Sequence(items) => items.iter().any(holds_tokens),
        _ => false,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::String(s) => parse_bool(s).unwrap_or(!s.is_empty()),
        Value::Null => false,
        Value::Integer(n) => *n != 0,
        _ => true,
    }
}

fn values_equal(value: &Value, literal: &str) -> bool {
    if let Value::Boolean(b) = value {
        return parse_bool(literal) == Some(*b);
    }
    let Some(text) = value.to_text() else {
        return false;
    };
    match (Decimal::from_str(&text), Decimal::from_str(literal)) {
        (Ok(left), Ok(right)) => left == right,
        _ => text == literal,
    }
}

impl Transformer for KeyConditionals {
    fn kind(&self) -> TransformerKind {
        TransformerKind::KeyConditionals
    }

    fn apply(&self, tree: &mut Tree, env: &Env<'_>) -> Result<usize> {
        let imports_pending = env.resolver.is_some() && imports::pending(tree);
        let mut changed = 0;

        for (keychain, key) in collect_keys(tree, |key| conditional_key(key).is_some()) {
            let Some(text) = conditional_key(&key) else {
                continue;
            };
            let condition = parse_condition(&text)?;
            let evaluator = Evaluator::new(tree, env.context, imports_pending);
            let Some(decision) = evaluator.evaluate(&condition) else {
                trace!(key = %key, "condition deferred");
                continue;
            };

            let mapping = tree.mapping_mut(&keychain)?;
            if decision {
                match mapping.get(&key).cloned() {
                    Some(Value::Mapping(contents)) => {
                        mapping.splice(&key, contents);
                    }
                    Some(Value::Null) | None => {
                        mapping.remove(&key);
                    }
                    Some(other) => {
                        return Err(TreeError::StructuralConflict {
                            keychain: keychain.child(&key).to_string(),
                            found: other.type_name(),
                        }
                        .into());
                    }
                }
            } else {
                mapping.remove(&key);
            }
            trace!(key = %key, decision, "conditional key");
            changed += 1;
        }

        debug!(changed, "key-conditionals");
        Ok(changed)
    }
}

impl Transformer for Conditionals {
    fn kind(&self) -> TransformerKind {
        TransformerKind::Conditionals
    }

    fn apply(&self, tree: &mut Tree, env: &Env<'_>) -> Result<usize> {
        let imports_pending = env.resolver.is_some() && imports::pending(tree);
        let changed = rewrite_leaves(tree, |tree, token, _| {
            let TokenKind::Conditional {
                condition,
                then: Some(then),
                otherwise,
            } = &token.kind
            else {
                return Ok(None);
            };
            let condition = parse_condition(condition)?;
            match Evaluator::new(tree, env.context, imports_pending).evaluate(&condition) {
                Some(true) => Ok(Some(Value::String(then.clone()))),
                Some(false) => Ok(Some(Value::String(otherwise.clone().unwrap_or_default()))),
                None => Err(Error::unresolved(token, "condition deferred")),
            }
        })?;
        debug!(changed, "conditionals");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::from_yaml_str;

    fn decide(yaml: &str, condition: &str) -> Option<bool> {
        let tree = from_yaml_str(yaml).unwrap();
        let condition = parse_condition(condition).unwrap();
        Evaluator::new(&tree, None, false).evaluate(&condition)
    }

    #[test]
    fn test_boolean_keys() {
        assert_eq!(decide("is-prod: y", "is-prod"), Some(true));
        assert_eq!(decide("is-prod: 'off'", "is-prod"), Some(false));
        assert_eq!(decide("is-prod: false", "!is-prod"), Some(true));
        assert_eq!(decide("name: n", "name"), Some(true));
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(decide("port: 5432", "port == 5432.0"), Some(true));
        assert_eq!(decide("port: '5432'", "port != 5433"), Some(true));
    }

    #[test]
    fn test_missing_keys_are_absent() {
        assert_eq!(decide("a: 1", "b"), Some(false));
        assert_eq!(decide("a: 1", "b == x"), Some(false));
        assert_eq!(decide("a: 1", "b != x"), Some(true));
    }

    #[test]
    fn test_unresolved_values_defer() {
        assert_eq!(decide("env: ))stage", "env == prod"), None);
        assert_eq!(decide("env: ))stage", "env == prod & a"), Some(false));
        assert_eq!(decide("env: ))stage\na: 1", "env == prod | a"), Some(true));
    }

    #[test]
    fn test_conditional_key_forms() {
        assert_eq!(conditional_key("?{use-tls}"), Some("use-tls".to_string()));
        assert_eq!(conditional_key("?{use-tls}/"), Some("use-tls".to_string()));
        assert_eq!(conditional_key("?{use-tls:on}"), None);
        assert_eq!(conditional_key("x-?{use-tls}"), None);
    }
}
