use tracing::debug;

use crate::{
    ast::TokenKind,
    error::Result,
    tree::Tree,
    value::Value,
};

use super::{Env, Transformer, TransformerKind, rewrite_leaves};

/// Replaces `!name(args))` in values with the result of the registered
/// handler. Unknown names abort the expansion.
pub struct Invocations;

impl Transformer for Invocations {
    fn kind(&self) -> TransformerKind {
        TransformerKind::Invocations
    }

    fn apply(&self, tree: &mut Tree, env: &Env<'_>) -> Result<usize> {
        let changed = rewrite_leaves(tree, |_, token, _| match &token.kind {
            TokenKind::Invocation { name, args } => {
                env.invocations.invoke(name, args).map(|text| Some(Value::String(text)))
            }
            _ => Ok(None),
        })?;
        debug!(changed, "invocations");
        Ok(changed)
    }
}
