//! Static analysis of a template before expansion.
//!
//! The validator builds the variable reference graph of a tree and reports
//! references that cannot resolve and references that form cycles. It never
//! modifies the tree.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::{
    ast::Token,
    keychain::Keychain,
    lexer,
    tree::Tree,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    UndefinedVariable,
    CircularDependency,
}

/// A problem found by the [`Validator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Reference analysis of one tree, with an optional context tree that
/// variables may also resolve against.
///
/// # Examples
///
/// ```
/// use cfgweave::{convert, IssueKind, Validator};
///
/// let tree = convert::from_yaml_str("a: ))b\nb: ))a\nurl: ))missing-host").unwrap();
/// let issues = Validator::new(&tree).collect_issues();
///
/// assert_eq!(issues.len(), 2);
/// assert_eq!(issues[0].kind, IssueKind::CircularDependency);
/// assert_eq!(issues[0].message, "circular dependency: a -> b -> a");
/// assert_eq!(issues[1].message, "undefined variable: ))missing-host (used at url)");
/// ```
pub struct Validator<'a> {
    tree: &'a Tree,
    context: Option<&'a Tree>,
}

/// Variable tokens held by a leaf, including inside sequences.
fn variables(value: &Value) -> Vec<Token> {
    match value {
        Value::String(s) => lexer::tokens(s).into_iter().filter(Token::is_variable).collect(),
        Value::Sequence(items) => items.iter().flat_map(variables).collect(),
        _ => Vec::new(),
    }
}

fn is_private(keychain: &Keychain) -> bool {
    keychain.last().is_some_and(|key| key.starts_with('_'))
}

impl<'a> Validator<'a> {
    pub fn new(tree: &'a Tree) -> Self {
        Validator { tree, context: None }
    }

    pub fn with_context(mut self, context: &'a Tree) -> Self {
        self.context = Some(context);
        self
    }

    /// Variable-holding leaves, relative keychains, in visit order.
    fn references(&self) -> Vec<(Keychain, Vec<Token>)> {
        self.tree
            .flatten(true)
            .into_iter()
            .filter(|(keychain, _)| !is_private(keychain))
            .map(|(keychain, value)| (keychain, variables(&value)))
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect()
    }

    /// Reverse reference index: each referenced variable with the keychains
    /// using it, in first-use order. `))host`, `)){host}` and `))host@[0]`
    /// share one entry.
    pub fn invert(&self) -> Vec<(Token, Vec<Keychain>)> {
        let mut inverted: Vec<(Token, Vec<Keychain>)> = Vec::new();
        for (keychain, tokens) in self.references() {
            for token in tokens.iter().map(Token::normalized) {
                match inverted.iter_mut().find(|(t, _)| t.raw == token.raw) {
                    Some((_, users)) => {
                        if !users.contains(&keychain) {
                            users.push(keychain.clone());
                        }
                    }
                    None => inverted.push((token, vec![keychain.clone()])),
                }
            }
        }
        inverted
    }

    /// Each referencing keychain with the tokens it references, leaving out
    /// references to a key of the same name (those resolve against the
    /// context tree).
    pub fn reduce(&self) -> Vec<(Keychain, Vec<Token>)> {
        self.references()
            .into_iter()
            .map(|(keychain, tokens)| {
                let tokens = tokens
                    .into_iter()
                    .filter(|token| token.target().and_then(Keychain::last) != keychain.last())
                    .collect::<Vec<_>>();
                (keychain, tokens)
            })
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect()
    }

    fn resolves(&self, target: &Keychain) -> bool {
        self.tree.contains(target) || self.context.is_some_and(|ctx| ctx.contains(target))
    }

    /// Tokens whose target resolves neither in the tree nor in the context.
    pub fn undefined(&self) -> Vec<Issue> {
        self.invert()
            .into_iter()
            .filter(|(token, _)| token.target().is_some_and(|target| !self.resolves(target)))
            .map(|(token, users)| {
                let users = users.iter().map(ToString::to_string).collect::<Vec<_>>();
                Issue {
                    kind: IssueKind::UndefinedVariable,
                    message: format!(
                        "undefined variable: {} (used at {})",
                        token,
                        users.join(", ")
                    ),
                }
            })
            .collect()
    }

    /// Edges from each referencing leaf to the referencing leaves its
    /// targets resolve to (all of them, for a mapping target).
    fn graph(&self) -> Vec<(Keychain, Vec<Keychain>)> {
        let reduced = self.reduce();
        let nodes: Vec<Keychain> = reduced.iter().map(|(keychain, _)| keychain.clone()).collect();

        reduced
            .iter()
            .map(|(keychain, tokens)| {
                let mut edges: Vec<Keychain> = Vec::new();
                for target in tokens.iter().filter_map(Token::target) {
                    let Ok(resolved) = self.tree.resolve(target) else {
                        continue;
                    };
                    let resolved = resolved.to_relative().with_trailing(false);
                    for node in nodes.iter().filter(|node| node.starts_with(&resolved)) {
                        if node != keychain && !edges.contains(node) {
                            edges.push(node.clone());
                        }
                    }
                }
                (keychain.clone(), edges)
            })
            .collect()
    }

    /// Reference cycles, each reported once, found by an explicit-stack
    /// depth-first search.
    pub fn cycles(&self) -> Vec<Issue> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let graph = self.graph();
        let index: HashMap<&Keychain, usize> =
            graph.iter().enumerate().map(|(i, (kc, _))| (kc, i)).collect();
        let edges: Vec<Vec<usize>> = graph
            .iter()
            .map(|(_, targets)| targets.iter().filter_map(|t| index.get(t).copied()).collect())
            .collect();

        let mut marks = vec![Mark::Unvisited; graph.len()];
        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        let mut issues = Vec::new();

        for start in 0..graph.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // (node, next edge to follow)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::OnStack;

            while let Some((node, next)) = stack.last().copied() {
                let Some(&target) = edges[node].get(next) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match marks[target] {
                    Mark::Unvisited => {
                        marks[target] = Mark::OnStack;
                        stack.push((target, 0));
                    }
                    Mark::OnStack => {
                        let from = stack.iter().position(|(n, _)| *n == target).unwrap_or(0);
                        let chain: Vec<usize> = stack[from..].iter().map(|(n, _)| *n).collect();
                        let mut key = chain.clone();
                        key.sort_unstable();
                        if seen.insert(key) {
                            let mut names: Vec<String> =
                                chain.iter().map(|&n| graph[n].0.to_string()).collect();
                            names.push(graph[target].0.to_string());
                            issues.push(Issue {
                                kind: IssueKind::CircularDependency,
                                message: format!("circular dependency: {}", names.join(" -> ")),
                            });
                        }
                    }
                    Mark::Done => {}
                }
            }
        }
        issues
    }

    /// All issues: cycles first, then undefined variables.
    pub fn collect_issues(&self) -> Vec<Issue> {
        let mut issues = self.cycles();
        issues.extend(self.undefined());
        issues
    }

    pub fn is_valid(&self) -> bool {
        self.collect_issues().is_empty()
    }

    /// Leaves still holding variable tokens, e.g. after an expansion.
    pub fn unresolved(&self) -> Vec<(Keychain, Vec<Token>)> {
        self.tree
            .flatten(true)
            .into_iter()
            .map(|(keychain, value)| (keychain, variables(&value)))
            .filter(|(_, tokens)| !tokens.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::from_yaml_str;

    fn tree(yaml: &str) -> Tree {
        from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn test_invert_groups_users() {
        let t = tree(
            "host: h\nurl: ))host\nalt:\n  - ))host\n  - ))port\nport: 1\n_hidden: ))nope",
        );
        let inverted = Validator::new(&t).invert();
        let users: Vec<(String, Vec<String>)> = inverted
            .iter()
            .map(|(token, users)| {
                (token.raw.clone(), users.iter().map(ToString::to_string).collect())
            })
            .collect();
        assert_eq!(
            users,
            vec![
                ("))host".to_string(), vec!["url".to_string(), "alt".to_string()]),
                ("))port".to_string(), vec!["alt".to_string()]),
            ]
        );
    }

    #[test]
    fn test_reduce_skips_same_name_references() {
        let t = tree("svc:\n  host: ))host\n  url: ))host");
        let reduced = Validator::new(&t).reduce();
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].0.to_string(), "svc/url");
    }

    #[test]
    fn test_context_satisfies_references() {
        let t = tree("url: ))missing-host");
        let ctx = tree("missing-host: h");
        assert!(!Validator::new(&t).is_valid());
        assert!(Validator::new(&t).with_context(&ctx).is_valid());
    }

    #[test]
    fn test_cycle_reported_once() {
        let t = tree("a: ))b\nb: ))c\nc: ))a\nd: ))a");
        let cycles = Validator::new(&t).cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].message, "circular dependency: a -> b -> c -> a");
    }

    #[test]
    fn test_cycle_through_mapping_target() {
        let t = tree("db:\n  url: ))cfg\ncfg: ))db");
        let cycles = Validator::new(&t).cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].kind, IssueKind::CircularDependency);
    }

    #[test]
    fn test_unresolved_after_expansion() {
        let t = tree("a: plain\nb: x-))y");
        let unresolved = Validator::new(&t).unresolved();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].0.to_string(), "b");
    }
}
