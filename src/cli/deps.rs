use crate::{Tree, Validator};

/// List references per keychain, or per variable with `inverted`.
///
/// ```text
/// url: ))host, ))port        ))host: url, dsn
/// dsn: ))host                ))port: url
/// ```
pub fn execute_deps(document: &Tree, inverted: bool) -> String {
    let validator = Validator::new(document);
    let lines: Vec<String> = if inverted {
        validator
            .invert()
            .into_iter()
            .map(|(token, users)| format!("{}: {}", token, join(users)))
            .collect()
    } else {
        validator
            .reduce()
            .into_iter()
            .map(|(keychain, tokens)| format!("{}: {}", keychain, join(tokens)))
            .collect()
    };
    lines.into_iter().map(|line| line + "\n").collect()
}

fn join<T: ToString>(items: Vec<T>) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
