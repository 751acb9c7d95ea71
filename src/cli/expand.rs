//! Expand a template and render the result.

use std::path::PathBuf;

use tracing::debug;

use super::CliError;
use crate::{Engine, ExpandOptions, FileResolver, Tree, Validator, output::{Format, render}};

/// Everything `expand` needs, with the input already parsed.
#[derive(Debug, Clone, Default)]
pub struct ExpandRequest {
    pub document: Tree,
    /// Directory relative imports resolve against
    pub base_dir: PathBuf,
    pub context: Option<Tree>,
    /// Transformer names; `None` for the default order
    pub transformers: Option<Vec<String>>,
    pub format: Format,
    /// Refuse to expand a template with undefined or circular references
    pub validate: bool,
}

pub fn execute_expand(request: &ExpandRequest) -> Result<String, CliError> {
    let mut options = ExpandOptions::default();
    if let Some(names) = &request.transformers {
        options = options.with_order_names(names.as_slice())?;
    }
    if let Some(context) = &request.context {
        options = options.with_context(context.clone());
    }

    if request.validate {
        let validator = Validator::new(&request.document);
        let validator = match &request.context {
            Some(context) => validator.with_context(context),
            None => validator,
        };
        let issues = validator.collect_issues();
        if !issues.is_empty() {
            return Err(CliError::from_issues(&issues));
        }
    }

    let engine = Engine::new().with_resolver(FileResolver::new(&request.base_dir));
    let mut tree = request.document.clone();
    let passes = engine.expand(&mut tree, &options)?;
    debug!(passes, "expanded");

    Ok(render(&tree.into(), request.format)?)
}
