use super::CliError;
use crate::{Tree, Validator};

/// Check a template for undefined and circular references.
pub fn execute_validate(document: &Tree, context: Option<&Tree>) -> Result<String, CliError> {
    let validator = Validator::new(document);
    let validator = match context {
        Some(context) => validator.with_context(context),
        None => validator,
    };
    let issues = validator.collect_issues();
    if issues.is_empty() {
        Ok("no issues found\n".to_string())
    } else {
        Err(CliError::from_issues(&issues))
    }
}
