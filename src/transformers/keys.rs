use tracing::debug;

use crate::{
    ast::{Token, TokenKind},
    error::{Error, Result},
    lexer,
    tree::Tree,
    value::Value,
};

use super::{
    Env, Transformer, TransformerKind, collect_keys, context::context_text, lookup_variable,
    rewrite_text,
};

/// Substitutes variables, context references and invocations in keys.
///
/// A key is renamed only when every token resolves to a scalar. Renaming
/// onto an existing key overlays onto it.
///
/// ```text
/// env: prod                  env: prod
/// ))env-db:           =>     prod-db:
///   host: h                    host: h
/// ```
pub struct Keys;

impl Transformer for Keys {
    fn kind(&self) -> TransformerKind {
        TransformerKind::Keys
    }

    fn apply(&self, tree: &mut Tree, env: &Env<'_>) -> Result<usize> {
        let mut changed = 0;

        for (keychain, key) in collect_keys(tree, lexer::has_tokens) {
            let position = keychain.child(&key);
            let renamed = rewrite_text(&key, &mut |token: &Token| match &token.kind {
                TokenKind::Variable { target, index, .. } => {
                    lookup_variable(tree, env.context, token, target, *index, &position).map(Some)
                }
                TokenKind::Context { index } => context_text(&keychain, *index)
                    .map(|text| Some(Value::String(text)))
                    .ok_or_else(|| {
                        Error::unresolved(token, format!("no such segment in '{}'", keychain))
                    }),
                TokenKind::Invocation { name, args } => {
                    env.invocations.invoke(name, args).map(|text| Some(Value::String(text)))
                }
                _ => Ok(None),
            })?;

            let Some(new_key) = renamed.and_then(|value| value.to_text()) else {
                continue;
            };
            if new_key != key && tree.mapping_mut(&keychain)?.rename(&key, &new_key) {
                changed += 1;
            }
        }

        debug!(changed, "keys");
        Ok(changed)
    }
}
