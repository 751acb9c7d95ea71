use tracing::debug;

use crate::{
    ast::TokenKind,
    error::Result,
    tree::Tree,
};

use super::{Env, Transformer, TransformerKind, lookup_variable, rewrite_leaves};

/// Substitutes `))key` and `)){keychain}` variables in values.
///
/// ```text
/// host: db.local                     host: db.local
/// url: postgres://))host       =>    url: postgres://db.local
/// port: )){/defaults/port}           port: 5432
/// ```
pub struct Values;

impl Transformer for Values {
    fn kind(&self) -> TransformerKind {
        TransformerKind::Values
    }

    fn apply(&self, tree: &mut Tree, env: &Env<'_>) -> Result<usize> {
        let changed = rewrite_leaves(tree, |tree, token, position| match &token.kind {
            TokenKind::Variable { target, index, .. } => {
                lookup_variable(tree, env.context, token, target, *index, position).map(Some)
            }
            _ => Ok(None),
        })?;
        debug!(changed, "values");
        Ok(changed)
    }
}
