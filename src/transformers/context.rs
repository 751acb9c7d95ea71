use tracing::debug;

use crate::{
    ast::TokenKind,
    error::{Error, Result},
    keychain::Keychain,
    tree::Tree,
    value::Value,
};

use super::{Env, Transformer, TransformerKind, rewrite_leaves};

/// Substitutes `@` (the keychain of the enclosing mapping) and `@[n]` (one
/// segment of it) in values.
///
/// ```text
/// svc:                        svc:
///   db:                         db:
///     name: "@[-1]"     =>        name: db
///     path: "@"                   path: /svc/db
/// ```
pub struct Context;

/// Text a context token stands for inside the mapping at `enclosing`.
pub(crate) fn context_text(enclosing: &Keychain, index: Option<i64>) -> Option<String> {
    match index {
        None => Some(enclosing.to_absolute().with_trailing(false).to_string()),
        Some(index) => enclosing.segment(index).map(str::to_string),
    }
}

impl Transformer for Context {
    fn kind(&self) -> TransformerKind {
        TransformerKind::Context
    }

    fn apply(&self, tree: &mut Tree, _env: &Env<'_>) -> Result<usize> {
        let changed = rewrite_leaves(tree, |_, token, position| {
            let TokenKind::Context { index } = token.kind else {
                return Ok(None);
            };
            let enclosing = position.parent().unwrap_or_default();
            context_text(&enclosing, index)
                .map(|text| Some(Value::String(text)))
                .ok_or_else(|| {
                    let reason = format!("no segment {} in '{}'", index.unwrap_or(0), enclosing);
                    Error::unresolved(token, reason)
                })
        })?;
        debug!(changed, "context");
        Ok(changed)
    }
}
