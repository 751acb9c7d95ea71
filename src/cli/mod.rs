//! Commands behind the `cfgweave` binary.
//!
//! Each command takes already-read input and returns the text to print, so
//! the commands can be driven from other tools without going through the
//! process boundary.

mod deps;
mod expand;
mod validate;

pub use deps::execute_deps;
pub use expand::{ExpandRequest, execute_expand};
pub use validate::execute_validate;

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::{Issue, Tree, convert};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] crate::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Validation found problems; one per line in `report`.
    #[error("{count} issue(s) found:\n{report}")]
    Issues { count: usize, report: String },

    #[error("No input provided. Pass a FILE or pipe a document to stdin.")]
    NoInput,
}

impl CliError {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let report = issues
            .iter()
            .map(|issue| format!("  {}", issue))
            .collect::<Vec<_>>()
            .join("\n");
        CliError::Issues {
            count: issues.len(),
            report,
        }
    }
}

/// Parse a document, as JSON when `path` has a `.json` extension and as
/// YAML otherwise (including stdin).
pub fn parse_document(text: &str, path: Option<&Path>) -> Result<Tree, CliError> {
    let is_json = path
        .and_then(Path::extension)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let tree = if is_json {
        convert::from_json_str(text)?
    } else {
        convert::from_yaml_str(text)?
    };
    Ok(tree)
}
