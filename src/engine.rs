//! Fixed-point expansion.
//!
//! One *pass* runs every configured transformer once, in order. Passes repeat
//! until a pass leaves the tree unchanged. There is no pass limit: a template
//! with a genuine reference cycle is caught by the
//! [`Validator`](crate::Validator) before expansion, not by the engine.

use tracing::{debug, trace};

use crate::{
    error::Result,
    host::{ImportResolver, InvocationRegistry},
    keychain::{Keychain, SEPARATOR},
    transformers::{Env, TransformerKind, imports},
    tree::Tree,
};

/// Per-expansion options.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandOptions {
    /// Transformers run by each pass, in order
    pub order: Vec<TransformerKind>,

    /// Fallback tree for variables and conditions that do not resolve in the
    /// expanded tree itself
    pub context: Option<Tree>,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        ExpandOptions {
            order: TransformerKind::DEFAULT_ORDER.to_vec(),
            context: None,
        }
    }
}

impl ExpandOptions {
    pub fn with_order(mut self, order: Vec<TransformerKind>) -> Self {
        self.order = order;
        self
    }

    /// Set the order from transformer names such as `values` or
    /// `key-conditionals`.
    pub fn with_order_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        self.order = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<_>>()?;
        Ok(self)
    }

    pub fn with_context(mut self, context: Tree) -> Self {
        self.context = Some(context);
        self
    }
}

/// Expands templates with injected host collaborators.
///
/// # Examples
///
/// ```
/// use cfgweave::{convert, Engine, ExpandOptions};
///
/// let mut tree = convert::from_yaml_str("host: db.local\nurl: postgres://))host").unwrap();
/// Engine::new().expand(&mut tree, &ExpandOptions::default()).unwrap();
///
/// assert_eq!(tree, convert::from_yaml_str("host: db.local\nurl: postgres://db.local").unwrap());
/// ```
pub struct Engine {
    resolver: Option<Box<dyn ImportResolver>>,
    invocations: InvocationRegistry,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine without an import resolver and with the builtin invocations.
    pub fn new() -> Self {
        Engine {
            resolver: None,
            invocations: InvocationRegistry::with_builtins(),
        }
    }

    pub fn with_resolver(mut self, resolver: impl ImportResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_invocations(mut self, invocations: InvocationRegistry) -> Self {
        self.invocations = invocations;
        self
    }

    pub fn resolver(&self) -> Option<&dyn ImportResolver> {
        self.resolver.as_deref()
    }

    pub fn invocations_mut(&mut self) -> &mut InvocationRegistry {
        &mut self.invocations
    }

    fn env<'a>(&'a self, options: &'a ExpandOptions) -> Env<'a> {
        Env {
            context: options.context.as_ref(),
            resolver: self.resolver.as_deref(),
            invocations: &self.invocations,
        }
    }

    /// Run one pass over `tree`, returning the number of rewrites.
    pub fn pass(&self, tree: &mut Tree, options: &ExpandOptions) -> Result<usize> {
        let env = self.env(options);
        let mut changed = 0;
        for kind in &options.order {
            let rewrites = kind.transformer().apply(tree, &env)?;
            trace!(transformer = %kind, rewrites, "applied");
            changed += rewrites;
        }
        Ok(changed)
    }

    /// Expand `tree` in place to a fixed point, returning the number of
    /// passes run (including the final unchanged one).
    pub fn expand(&self, tree: &mut Tree, options: &ExpandOptions) -> Result<usize> {
        let mut passes = 0;
        loop {
            let before = tree.clone();
            passes += 1;
            let changed = self.pass(tree, options)?;
            debug!(pass = passes, changed, "expansion pass");
            if *tree == before {
                return Ok(passes);
            }
        }
    }

    /// Expand a copy of `template`.
    pub fn expanded(&self, template: &Tree, options: &ExpandOptions) -> Result<Tree> {
        let mut tree = template.clone();
        self.expand(&mut tree, options)?;
        Ok(tree)
    }
}

/// Overlay an imported document onto `tree` at `at`.
///
/// `source` is `path#selector` (or just `path` for the whole document). A
/// trailing separator on `at` clears the target before the overlay, so `"/"`
/// replaces the whole tree.
pub fn merge(
    tree: &mut Tree,
    resolver: &dyn ImportResolver,
    source: &str,
    at: &str,
) -> Result<()> {
    let (path, selector) = source.split_once('#').unwrap_or((source, ""));
    let value = imports::load(resolver, path, selector)?;

    let clear = at.ends_with(SEPARATOR);
    let at = Keychain::parse(at);
    if clear {
        if at.is_root() {
            tree.reset(None)?;
        } else if tree.contains(&at) {
            tree.pop(&at)?;
        }
    }
    debug!(source, at = %at, "merge");
    tree.overlay_at(at.with_trailing(false), value)?;
    Ok(())
}
