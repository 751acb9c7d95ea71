// tests/tree_tests.rs

use cfgweave::convert::from_yaml_str;
use cfgweave::{Flow, Keychain, Mapping, Order, Tree, TreeError, Value, Visitor};

fn tree(yaml: &str) -> Tree {
    from_yaml_str(yaml).unwrap()
}

fn value(yaml: &str) -> Value {
    tree(yaml).into()
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn test_get_leaf_by_search_and_exact() {
    let t = tree("a: A\nb:\n  c: BC");
    assert_eq!(t.get("a").unwrap(), Value::from("A"));
    assert_eq!(t.get("c").unwrap(), Value::from("BC"));
    assert_eq!(t.get("/b/c").unwrap(), Value::from("BC"));
    assert_eq!(t.get("b/c").unwrap(), Value::from("BC"));
}

#[test]
fn test_get_mapping_wrapper_and_contents() {
    let t = tree("b:\n  c: BC\n  d: BD");
    assert_eq!(t.get("b").unwrap(), value("b:\n  c: BC\n  d: BD"));
    assert_eq!(t.get("b/").unwrap(), value("c: BC\nd: BD"));
}

#[test]
fn test_get_root() {
    let t = tree("a: A\nb:\n  c: BC");
    assert_eq!(t.get("").unwrap(), Value::from(t.clone()));
    assert_eq!(t.get("/").unwrap(), Value::from(t.clone()));
    assert_eq!(t.get(Vec::<&str>::new()).unwrap(), Value::from(t.clone()));
}

#[test]
fn test_get_missing() {
    let t = tree("a: A\nb:\n  c: BC");
    assert_eq!(t.get("/c"), Err(TreeError::not_found("/c")));
    assert!(t.get("x").is_err());
    assert!(t.get("/a/x").is_err());
}

#[test]
fn test_key_order_preserved() {
    let t = tree("z: 1\na: 2\nm: 3");
    assert_eq!(t.keys("").unwrap(), vec!["z", "a", "m"]);
    let _ = t.get("a").unwrap();
    assert_eq!(t.keys("").unwrap(), vec!["z", "a", "m"]);
}

// ============================================================================
// Search
// ============================================================================

#[test]
fn test_dfs_prefers_deepest() {
    let t = tree("a:\n  b: AB\nb: B");
    let (keychain, found) = t.dfs("b").unwrap();
    assert_eq!(keychain.to_string(), "/a/b");
    assert_eq!(found, &Value::from("AB"));

    let t = tree("a:\n  b: AB\nb: B\nc:\n  d:\n    b: CDB");
    assert_eq!(t.dfs("b").unwrap().0.to_string(), "/c/d/b");
}

#[test]
fn test_dfs_ties_go_to_earliest() {
    let t = tree("x:\n  k: first\ny:\n  k: second");
    assert_eq!(t.dfs("k").unwrap().0.to_string(), "/x/k");
}

#[test]
fn test_dfs_missing() {
    let t = tree("a: A");
    assert!(matches!(t.dfs("b"), Err(TreeError::NotFound { .. })));
}

#[test]
fn test_relative_multi_segment_tries_each_match() {
    let t = tree("svc:\n  db:\n    host: h1\nother:\n  deep:\n    db:\n      port: 1");
    // the deepest `db` has no `host`, so the next match is used
    assert_eq!(t.get("db/host").unwrap(), Value::from("h1"));
    assert_eq!(t.resolve("db/host").unwrap().to_string(), "/svc/db/host");
}

// ============================================================================
// Writes
// ============================================================================

#[test]
fn test_set_then_get() {
    let mut t = Tree::new();
    t.set("/a/b/c", Value::from("ABC")).unwrap();
    assert_eq!(t.get("/a/b/c").unwrap(), Value::from("ABC"));
    assert_eq!(t, tree("a:\n  b:\n    c: ABC"));
}

#[test]
fn test_set_returns_what_get_returns() {
    let mut t = tree("a:\n  b: B");
    let written = t.set("a", value("c: C")).unwrap();
    assert_eq!(written, t.get("a").unwrap());
    assert_eq!(t, tree("a:\n  b: B\n  c: C"));
}

#[test]
fn test_set_overwrites_scalars_and_sequences() {
    let mut t = tree("a: A\nl: [1, 2]");
    t.set("a", Value::from("new")).unwrap();
    t.set("l", Value::Sequence(vec![Value::Integer(3)])).unwrap();
    assert_eq!(t, tree("a: new\nl: [3]"));
}

#[test]
fn test_relative_write_anchors_at_mapping_match() {
    let mut t = tree("svc:\n  db:\n    host: h");
    t.set("db/port", Value::Integer(5432)).unwrap();
    assert_eq!(t.get("/svc/db/port").unwrap(), Value::Integer(5432));

    // no mapping match: anchored at the root
    t.set("cache/size", Value::Integer(1)).unwrap();
    assert_eq!(t.get("/cache/size").unwrap(), Value::Integer(1));
}

#[test]
fn test_write_through_scalar_conflicts() {
    let mut t = tree("a: A");
    let err = t.set("/a/b", Value::from("x")).unwrap_err();
    assert!(matches!(err, TreeError::StructuralConflict { .. }));
}

#[test]
fn test_root_write() {
    let mut t = tree("a: A");
    t.set("", value("b: B")).unwrap();
    assert_eq!(t, tree("a: A\nb: B"));
    assert_eq!(
        t.set("/", Value::from("x")),
        Err(TreeError::RootWriteConflict { found: "string" })
    );
}

#[test]
fn test_get_or_set_and_append() {
    let mut t = tree("a: A");
    assert_eq!(t.get_or_set("a", Value::from("other")).unwrap(), Value::from("A"));
    assert_eq!(t.get_or_set("/b", Value::from("B")).unwrap(), Value::from("B"));

    assert_eq!(
        t.append("a", Value::from("A2")).unwrap(),
        Value::Sequence(vec![Value::from("A"), Value::from("A2")])
    );
    t.append("/list", Value::Sequence(vec![Value::Integer(1), Value::Integer(2)])).unwrap();
    assert_eq!(t, tree("a: [A, A2]\nb: B\nlist: [1, 2]"));

    t.set("/m/k", Value::Integer(1)).unwrap();
    assert!(t.append("m", Value::Integer(1)).is_err());
}

// ============================================================================
// Pop, overlay, reset
// ============================================================================

#[test]
fn test_pop_keeps_siblings() {
    let mut t = tree("a:\n  b: AB\n  c: AC\nd: D");
    assert_eq!(t.pop("b").unwrap(), Value::from("AB"));
    assert_eq!(t, tree("a:\n  c: AC\nd: D"));
    assert_eq!(t.pop("a").unwrap(), value("a:\n  c: AC"));
    assert_eq!(t, tree("d: D"));
    assert!(t.pop("a").is_err());
}

#[test]
fn test_pop_root_takes_contents() {
    let mut t = tree("a: A");
    assert_eq!(t.pop("").unwrap(), value("a: A"));
    assert!(t.is_empty());
}

#[test]
fn test_overlay_is_recursive_union() {
    let mut t = tree("a:\n  b: B");
    t.overlay(tree("a:\n  c: C"));
    assert_eq!(t, tree("a:\n  b: B\n  c: C"));
}

#[test]
fn test_overlay_replaces_sequences() {
    let mut t = tree("l: [1, 2]\nk: keep");
    t.overlay(tree("l: [3]"));
    assert_eq!(t, tree("l: [3]\nk: keep"));
}

#[test]
fn test_overlay_at() {
    let mut t = tree("svc:\n  db:\n    host: h");
    t.overlay_at("db", value("port: 1")).unwrap();
    assert_eq!(t, tree("svc:\n  db:\n    host: h\n    port: 1"));
}

#[test]
fn test_reset_keeps_subtree() {
    let mut t = tree("a: A\nsvc:\n  db:\n    host: h\nz: Z");
    t.reset(Some(&Keychain::parse("db"))).unwrap();
    assert_eq!(t, tree("svc:\n  db:\n    host: h"));
    t.reset(None).unwrap();
    assert!(t.is_empty());
}

// ============================================================================
// Visit and flatten
// ============================================================================

#[derive(Default)]
struct Recorder {
    pre: Vec<String>,
    post: Vec<String>,
    values: Vec<String>,
}

impl Visitor for Recorder {
    fn pre(&mut self, _mapping: &Mapping, keychain: &Keychain) -> Flow {
        self.pre.push(keychain.to_string());
        Flow::Continue
    }

    fn post(&mut self, _mapping: &Mapping, keychain: &Keychain) -> Flow {
        self.post.push(keychain.to_string());
        Flow::Continue
    }

    fn value(&mut self, _value: &Value, keychain: &Keychain) -> Flow {
        self.values.push(keychain.to_string());
        Flow::Continue
    }
}

const NESTED: &str = "a:\n  a: AA\n  c:\n    a: ACA\nb:\n  a: BA";

#[test]
fn test_visit_pre_order() {
    let mut recorder = Recorder::default();
    tree(NESTED).visit(&mut recorder, Order::Forward);
    assert_eq!(recorder.pre, vec!["", "a", "a/c", "b"]);
    assert_eq!(recorder.post, vec!["a/c", "a", "b", ""]);
    assert_eq!(recorder.values, vec!["a/a", "a/c/a", "b/a"]);
}

#[test]
fn test_visit_reverse_flips_siblings_only() {
    let mut recorder = Recorder::default();
    tree(NESTED).visit(&mut recorder, Order::Reverse);
    assert_eq!(recorder.pre, vec!["", "b", "a", "a/c"]);
    assert_eq!(recorder.values, vec!["b/a", "a/c/a", "a/a"]);
}

#[test]
fn test_visit_skip_and_stop() {
    struct SkipA(Vec<String>);

    impl Visitor for SkipA {
        fn pre(&mut self, _mapping: &Mapping, keychain: &Keychain) -> Flow {
            if keychain.last() == Some("a") { Flow::Skip } else { Flow::Continue }
        }

        fn value(&mut self, _value: &Value, keychain: &Keychain) -> Flow {
            self.0.push(keychain.to_string());
            Flow::Continue
        }
    }

    struct StopAtFirst(usize);

    impl Visitor for StopAtFirst {
        fn value(&mut self, _value: &Value, _keychain: &Keychain) -> Flow {
            self.0 += 1;
            Flow::Stop
        }
    }

    let mut skip = SkipA(Vec::new());
    tree(NESTED).visit(&mut skip, Order::Forward);
    assert_eq!(skip.0, vec!["b/a"]);

    let mut stop = StopAtFirst(0);
    tree(NESTED).visit(&mut stop, Order::Forward);
    assert_eq!(stop.0, 1);
}

#[test]
fn test_flatten() {
    let t = tree("a:\n  b: AB\n  l: [1, 2]\nc: C");
    let absolute: Vec<(String, Value)> = t
        .flatten(false)
        .into_iter()
        .map(|(kc, v)| (kc.to_string(), v))
        .collect();
    assert_eq!(
        absolute,
        vec![
            ("/a/b".to_string(), Value::from("AB")),
            ("/a/l".to_string(), Value::Sequence(vec![Value::Integer(1), Value::Integer(2)])),
            ("/c".to_string(), Value::from("C")),
        ]
    );

    let relative: Vec<String> = t.flatten(true).into_iter().map(|(kc, _)| kc.to_string()).collect();
    assert_eq!(relative, vec!["a/b", "a/l", "c"]);
}
