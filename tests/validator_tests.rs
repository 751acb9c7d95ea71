// tests/validator_tests.rs

use cfgweave::convert::from_yaml_str;
use cfgweave::{Engine, ExpandOptions, IssueKind, Tree, Validator};

fn tree(yaml: &str) -> Tree {
    from_yaml_str(yaml).unwrap()
}

fn messages(t: &Tree) -> Vec<String> {
    Validator::new(t)
        .collect_issues()
        .into_iter()
        .map(|issue| issue.to_string())
        .collect()
}

// ============================================================================
// Undefined variables
// ============================================================================

#[test]
fn test_undefined_variable() {
    let t = tree("url: postgres://))missing-host");
    assert_eq!(
        messages(&t),
        vec!["undefined variable: ))missing-host (used at url)"]
    );
}

#[test]
fn test_undefined_lists_every_use() {
    let t = tree("a: ))nope\nsvc:\n  b: x-))nope");
    assert_eq!(
        messages(&t),
        vec!["undefined variable: ))nope (used at a, svc/b)"]
    );
}

#[test]
fn test_spellings_of_one_variable_reported_together() {
    let t = tree("a: ))host\nb: x-)){host}\nc: ))host@[0]");
    assert_eq!(
        messages(&t),
        vec!["undefined variable: ))host (used at a, b, c)"]
    );
}

#[test]
fn test_braced_keychains_checked_exactly() {
    let t = tree("svc:\n  host: h\nok: )){svc/host}\nbad: )){/host}");
    let issues = Validator::new(&t).undefined();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].message, "undefined variable: )){/host} (used at bad)");
}

#[test]
fn test_private_keys_are_not_checked() {
    let t = tree("_template: ))filled-in-later\nname: n");
    assert!(Validator::new(&t).is_valid());
}

#[test]
fn test_context_resolves_undefined() {
    let t = tree("url: ))missing-host");
    let ctx = tree("missing-host: h");
    assert!(Validator::new(&t).with_context(&ctx).collect_issues().is_empty());
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn test_two_node_cycle_reported_once() {
    let t = tree("a: ))b\nb: ))a");
    let issues = Validator::new(&t).collect_issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::CircularDependency);
    assert_eq!(issues[0].message, "circular dependency: a -> b -> a");
}

#[test]
fn test_independent_cycles() {
    let t = tree("a: ))b\nb: ))a\nc: ))d\nd: ))c\ne: ))a");
    let cycles = Validator::new(&t).cycles();
    assert_eq!(
        cycles.iter().map(|i| i.message.as_str()).collect::<Vec<_>>(),
        vec!["circular dependency: a -> b -> a", "circular dependency: c -> d -> c"]
    );
}

#[test]
fn test_chains_are_not_cycles() {
    let t = tree("a: ))b\nb: ))c\nc: value\nd: ))a");
    assert!(Validator::new(&t).is_valid());
}

#[test]
fn test_self_reference_is_not_a_cycle() {
    let t = tree("host: ))host");
    assert!(Validator::new(&t).cycles().is_empty());
}

#[test]
fn test_cycles_and_undefined_together() {
    let t = tree("a: ))b\nb: ))a\nurl: ))missing-host");
    let issues = Validator::new(&t).collect_issues();
    let kinds: Vec<IssueKind> = issues.iter().map(|i| i.kind).collect();
    assert_eq!(kinds, vec![IssueKind::CircularDependency, IssueKind::UndefinedVariable]);
}

// ============================================================================
// Dependency views
// ============================================================================

#[test]
fn test_reduce_and_invert() {
    let t = tree("host: h\nport: 1\nurl: ))host:))port\ndsn: ))host");

    let reduced: Vec<(String, Vec<String>)> = Validator::new(&t)
        .reduce()
        .into_iter()
        .map(|(kc, tokens)| (kc.to_string(), tokens.iter().map(|t| t.raw.clone()).collect()))
        .collect();
    assert_eq!(
        reduced,
        vec![
            ("url".to_string(), vec!["))host".to_string(), "))port".to_string()]),
            ("dsn".to_string(), vec!["))host".to_string()]),
        ]
    );

    let inverted: Vec<(String, Vec<String>)> = Validator::new(&t)
        .invert()
        .into_iter()
        .map(|(token, users)| (token.raw, users.iter().map(ToString::to_string).collect()))
        .collect();
    assert_eq!(
        inverted,
        vec![
            ("))host".to_string(), vec!["url".to_string(), "dsn".to_string()]),
            ("))port".to_string(), vec!["url".to_string()]),
        ]
    );
}

#[test]
fn test_invert_groups_by_target() {
    let t = tree(
        "hosts: [h1, h2]\nfirst: ))hosts@[0]\nall: )){hosts}\nsvc:\n  db: )){svc/x}\n  x: ))hosts",
    );
    let inverted: Vec<(String, Vec<String>)> = Validator::new(&t)
        .invert()
        .into_iter()
        .map(|(token, users)| (token.raw, users.iter().map(ToString::to_string).collect()))
        .collect();
    assert_eq!(
        inverted,
        vec![
            (
                "))hosts".to_string(),
                vec!["first".to_string(), "all".to_string(), "svc/x".to_string()]
            ),
            (")){svc/x}".to_string(), vec!["svc/db".to_string()]),
        ]
    );
}

#[test]
fn test_unresolved_after_expansion() {
    let template = tree("host: h\nurl: ))host\nleft: ))nowhere");
    let expanded = Engine::new().expanded(&template, &ExpandOptions::default()).unwrap();
    let unresolved = Validator::new(&expanded).unresolved();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].0.to_string(), "left");
    assert_eq!(unresolved[0].1[0].raw, "))nowhere");
}
