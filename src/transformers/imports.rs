use std::path::Path;

use tracing::{debug, warn};

use crate::{
    ast::{Fragment, TokenKind},
    error::{Error, Result},
    host::ImportResolver,
    keychain::Keychain,
    lexer,
    tree::{Flow, Order, Tree, Visitor},
    value::{Mapping, Value},
};

use super::{Env, Transformer, TransformerKind, collect_keys, rewrite_leaves};

/// Resolves `+path#selector)` imports.
///
/// In a value the selected node replaces the token. A key that is exactly
/// an import token is replaced by the imported mapping, with the key's own
/// mapping overlaid on top:
///
/// ```text
/// +base.yaml#db/):        host: db.local
///   port: 6543      =>    port: 6543
/// ```
pub struct Imports;

/// Includes the text of `+path)` files in values.
pub struct PlainText;

impl Transformer for Imports {
    fn kind(&self) -> TransformerKind {
        TransformerKind::Imports
    }

    fn apply(&self, tree: &mut Tree, env: &Env<'_>) -> Result<usize> {
        let Some(resolver) = env.resolver else {
            if pending(tree) {
                warn!("import tokens left in place: no import resolver configured");
            }
            return Ok(0);
        };

        let mut changed = import_keys(tree, resolver)?;
        changed += rewrite_leaves(tree, |_, token, _| match &token.kind {
            TokenKind::Import {
                path,
                selector: Some(selector),
            } => load(resolver, path, selector).map(Some),
            _ => Ok(None),
        })?;
        debug!(changed, "imports");
        Ok(changed)
    }
}

impl Transformer for PlainText {
    fn kind(&self) -> TransformerKind {
        TransformerKind::PlainText
    }

    fn apply(&self, tree: &mut Tree, env: &Env<'_>) -> Result<usize> {
        let Some(resolver) = env.resolver else {
            return Ok(0);
        };
        let changed = rewrite_leaves(tree, |_, token, _| match &token.kind {
            TokenKind::Import {
                path,
                selector: None,
            } => resolver.read_text(path).map(|text| Some(Value::String(text))),
            _ => Ok(None),
        })?;
        debug!(changed, "plaintext");
        Ok(changed)
    }
}

/// Load an import and rebase the relative imports it contains.
pub(crate) fn load(resolver: &dyn ImportResolver, path: &str, selector: &str) -> Result<Value> {
    let imported = resolver.resolve(path, selector)?;
    debug!(path, selector, "imported");
    Ok(match imported.base_dir {
        Some(dir) => rebase(imported.value, &dir),
        None => imported.value,
    })
}

fn import_keys(tree: &mut Tree, resolver: &dyn ImportResolver) -> Result<usize> {
    let found = collect_keys(tree, |key| import_key(key).is_some());
    let mut changed = 0;

    for (keychain, key) in found {
        let Some((path, selector)) = import_key(&key) else {
            continue;
        };
        let mut merged = match load(resolver, &path, &selector)? {
            Value::Mapping(m) => m,
            Value::Null => Mapping::new(),
            other => {
                return Err(Error::Import {
                    path,
                    message: format!(
                        "key import selected a {}, expected a mapping",
                        other.type_name()
                    ),
                });
            }
        };
        let mapping = tree.mapping_mut(&keychain)?;
        if let Some(Value::Mapping(own)) = mapping.get(&key).cloned() {
            merged.overlay(own);
        }
        mapping.splice(&key, merged);
        changed += 1;
    }
    Ok(changed)
}

fn import_key(key: &str) -> Option<(String, String)> {
    match lexer::whole_token(key)?.kind {
        TokenKind::Import {
            path,
            selector: Some(selector),
        } => Some((path, selector)),
        _ => None,
    }
}

/// Prefix relative import paths in `value` (keys and strings) with `dir`.
pub(crate) fn rebase(value: Value, dir: &Path) -> Value {
    match value {
        Value::String(s) => Value::String(rebase_text(&s, dir)),
        Value::Sequence(items) => {
            Value::Sequence(items.into_iter().map(|item| rebase(item, dir)).collect())
        }
        Value::Mapping(m) => Value::Mapping(
            m.into_iter()
                .map(|(k, v)| (rebase_text(&k, dir), rebase(v, dir)))
                .collect(),
        ),
        scalar => scalar,
    }
}

fn rebase_text(text: &str, dir: &Path) -> String {
    let fragments = lexer::tokenize(text);
    if !fragments.iter().any(|f| f.as_token().is_some_and(|t| t.is_import())) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for fragment in fragments {
        match fragment {
            Fragment::Literal(s) => out.push_str(&s),
            Fragment::Token(token) => match &token.kind {
                TokenKind::Import { path, selector } if !Path::new(path).is_absolute() => {
                    out.push('+');
                    out.push_str(&dir.join(path).to_string_lossy());
                    if let Some(selector) = selector {
                        out.push('#');
                        out.push_str(selector);
                    }
                    out.push(')');
                }
                _ => out.push_str(&token.raw),
            },
        }
    }
    out
}

/// True while any key or value still holds an import token.
pub(crate) fn pending(tree: &Tree) -> bool {
    struct Finder {
        found: bool,
    }

    fn holds_import(value: &Value) -> bool {
        match value {
            Value::String(s) => lexer::tokens(s).iter().any(|t| t.is_import()),
            Value::Sequence(items) => items.iter().any(holds_import),
            _ => false,
        }
    }

    impl Visitor for Finder {
        fn pre(&mut self, mapping: &Mapping, _keychain: &Keychain) -> Flow {
            if mapping.keys().any(|key| lexer::tokens(key).iter().any(|t| t.is_import())) {
                self.found = true;
                return Flow::Stop;
            }
            Flow::Continue
        }

        fn value(&mut self, value: &Value, _keychain: &Keychain) -> Flow {
            if holds_import(value) {
                self.found = true;
                return Flow::Stop;
            }
            Flow::Continue
        }
    }

    let mut finder = Finder { found: false };
    tree.visit(&mut finder, Order::Forward);
    finder.found
}
