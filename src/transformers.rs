//! Rewrite passes, one per token kind.
//!
//! Every pass walks the current tree, resolves the tokens it owns and
//! rewrites them in place. A token that cannot be resolved yet is left as
//! literal text for a later pass or for the [`Validator`](crate::Validator);
//! only errors that no later pass can fix (unknown invocations, failed
//! imports, structural conflicts) abort a pass.
//!
//! | Kind | Rewrites |
//! |---|---|
//! | `imports` | `+path#selector)` in values and keys |
//! | `values` | `))key` in values |
//! | `context` | `@` and `@[n]` in values |
//! | `invocations` | `!name(args))` in values |
//! | `keys` | `))key`, `@` and `!name(args))` in keys |
//! | `key-conditionals` | `?{cond}` keys |
//! | `conditionals` | `?{cond:then:else}` in values |
//! | `plaintext` | `+path)` in values |

pub mod conditionals;
pub mod context;
pub mod imports;
pub mod invocations;
pub mod keys;
pub mod values;

use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::{
    ast::{Fragment, Token},
    error::{Error, Result},
    host::{ImportResolver, InvocationRegistry},
    keychain::Keychain,
    lexer,
    tree::{Flow, Order, Tree, Visitor},
    value::{Mapping, Value},
};

/// Collaborators and options visible to a pass.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    /// Fallback tree for variables and conditions that do not resolve locally
    pub context: Option<&'a Tree>,
    pub resolver: Option<&'a dyn ImportResolver>,
    pub invocations: &'a InvocationRegistry,
}

/// One rewrite pass.
pub trait Transformer {
    fn kind(&self) -> TransformerKind;

    /// Rewrite `tree` in place, returning the number of rewritten nodes.
    fn apply(&self, tree: &mut Tree, env: &Env<'_>) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformerKind {
    Imports,
    Values,
    Context,
    Invocations,
    Keys,
    KeyConditionals,
    Conditionals,
    PlainText,
}

impl TransformerKind {
    pub const DEFAULT_ORDER: [TransformerKind; 8] = [
        TransformerKind::Imports,
        TransformerKind::Values,
        TransformerKind::Context,
        TransformerKind::Invocations,
        TransformerKind::Keys,
        TransformerKind::KeyConditionals,
        TransformerKind::Conditionals,
        TransformerKind::PlainText,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransformerKind::Imports => "imports",
            TransformerKind::Values => "values",
            TransformerKind::Context => "context",
            TransformerKind::Invocations => "invocations",
            TransformerKind::Keys => "keys",
            TransformerKind::KeyConditionals => "key-conditionals",
            TransformerKind::Conditionals => "conditionals",
            TransformerKind::PlainText => "plaintext",
        }
    }

    pub fn transformer(&self) -> &'static dyn Transformer {
        match self {
            TransformerKind::Imports => &imports::Imports,
            TransformerKind::Values => &values::Values,
            TransformerKind::Context => &context::Context,
            TransformerKind::Invocations => &invocations::Invocations,
            TransformerKind::Keys => &keys::Keys,
            TransformerKind::KeyConditionals => &conditionals::KeyConditionals,
            TransformerKind::Conditionals => &conditionals::Conditionals,
            TransformerKind::PlainText => &imports::PlainText,
        }
    }
}

impl fmt::Display for TransformerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransformerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TransformerKind::DEFAULT_ORDER
            .into_iter()
            .find(|kind| kind.name() == s.trim())
            .ok_or_else(|| Error::UnknownTransformer {
                name: s.to_string(),
            })
    }
}

/// Resolve one token, `Ok(None)` meaning "not mine".
fn resolve_with<F>(token: &Token, resolve: &mut F) -> Result<Option<Value>>
where
    F: FnMut(&Token) -> Result<Option<Value>>,
{
    match resolve(token) {
        Ok(value) => Ok(value),
        Err(e) if e.is_recoverable() => {
            trace!(token = %token, error = %e, "token left for a later pass");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Rewrite the tokens of `text`.
///
/// A text that is exactly one token takes the resolved value as-is (typed);
/// otherwise scalar results are spliced into the surrounding text and
/// containers leave their token in place. Returns `None` when nothing
/// changed.
pub(crate) fn rewrite_text<F>(text: &str, resolve: &mut F) -> Result<Option<Value>>
where
    F: FnMut(&Token) -> Result<Option<Value>>,
{
    let fragments = lexer::tokenize(text);
    if let [Fragment::Token(token)] = fragments.as_slice() {
        let resolved = resolve_with(token, resolve)?;
        if let Some(value) = &resolved {
            trace!(token = %token, value = %value, "resolved");
        }
        return Ok(resolved);
    }

    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    for fragment in &fragments {
        match fragment {
            Fragment::Literal(s) => out.push_str(s),
            Fragment::Token(token) => {
                match resolve_with(token, resolve)?.and_then(|v| v.to_text()) {
                    Some(text) => {
                        trace!(token = %token, value = %text, "resolved");
                        out.push_str(&text);
                        changed = true;
                    }
                    None => out.push_str(&token.raw),
                }
            }
        }
    }
    Ok(changed.then_some(Value::String(out)))
}

/// Rewrite the strings of a leaf, descending into sequences.
pub(crate) fn rewrite_value<F>(value: &Value, resolve: &mut F) -> Result<Option<Value>>
where
    F: FnMut(&Token) -> Result<Option<Value>>,
{
    match value {
        Value::String(s) => rewrite_text(s, resolve),
        Value::Sequence(items) => {
            let mut rewritten = Vec::with_capacity(items.len());
            let mut changed = false;
            for item in items {
                match rewrite_value(item, resolve)? {
                    Some(new) => {
                        rewritten.push(new);
                        changed = true;
                    }
                    None => rewritten.push(item.clone()),
                }
            }
            Ok(changed.then_some(Value::Sequence(rewritten)))
        }
        _ => Ok(None),
    }
}

/// Rewrite every leaf of `tree` with `resolve`, which receives the tree as
/// it stands, the token and the leaf's absolute keychain.
pub(crate) fn rewrite_leaves<F>(tree: &mut Tree, mut resolve: F) -> Result<usize>
where
    F: FnMut(&Tree, &Token, &Keychain) -> Result<Option<Value>>,
{
    let mut changed = 0;
    for (keychain, value) in tree.flatten(false) {
        let rewritten =
            rewrite_value(&value, &mut |token: &Token| resolve(tree, token, &keychain))?;
        if let Some(new) = rewritten {
            tree.set(&keychain, new)?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Keys accepted by `select`, each with the absolute keychain of its
/// mapping. Descendants come before their ancestors, so rewriting the list
/// in order never invalidates a keychain still to be visited.
pub(crate) fn collect_keys<F>(tree: &Tree, select: F) -> Vec<(Keychain, String)>
where
    F: Fn(&str) -> bool,
{
    struct Collector<F> {
        select: F,
        found: Vec<(Keychain, String)>,
    }

    impl<F: Fn(&str) -> bool> Visitor for Collector<F> {
        fn post(&mut self, mapping: &Mapping, keychain: &Keychain) -> Flow {
            for key in mapping.keys().filter(|key| (self.select)(key)) {
                self.found.push((keychain.to_absolute(), key.to_string()));
            }
            Flow::Continue
        }
    }

    let mut collector = Collector {
        select,
        found: Vec::new(),
    };
    tree.visit(&mut collector, Order::Forward);
    collector.found
}

/// Resolve a variable target against the tree, then the context tree.
///
/// A target that is the referencing position itself, or one of its
/// ancestors, is a local failure.
pub(crate) fn lookup_variable(
    tree: &Tree,
    context: Option<&Tree>,
    token: &Token,
    target: &Keychain,
    index: Option<i64>,
    position: &Keychain,
) -> Result<Value> {
    let contents = target.with_trailing(true);
    let local = match tree.resolve(target) {
        Ok(resolved) if !position.starts_with(&resolved) => tree.get(&contents).ok(),
        _ => None,
    };
    let value = local
        .or_else(|| context.and_then(|ctx| ctx.get(&contents).ok()))
        .ok_or_else(|| Error::unresolved(token, format!("'{}' not found", target)))?;

    let Some(index) = index else {
        return Ok(value);
    };
    let Value::Sequence(items) = value else {
        return Err(Error::unresolved(token, format!("'{}' is not a sequence", target)));
    };
    let len = items.len() as i64;
    let at = if index < 0 { len + index } else { index };
    if at < 0 || at >= len {
        return Err(Error::unresolved(token, format!("index {} out of range", index)));
    }
    Ok(items[at as usize].clone())
}
