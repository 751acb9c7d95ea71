use std::fs;

use cfgweave::convert::{from_json_str, from_yaml_str};
use cfgweave::output::{Format, render};
use cfgweave::{
    CoercionRegistry, Engine, Error, ExpandOptions, FileResolver, MemoryResolver, TransformerKind,
    Tree, Typed, Value, coerce, merge,
};

fn tree(yaml: &str) -> Tree {
    from_yaml_str(yaml).unwrap()
}

fn expand_with(yaml: &str, order: Vec<TransformerKind>) -> Tree {
    let options = ExpandOptions::default().with_order(order);
    Engine::new().expanded(&tree(yaml), &options).unwrap()
}

const TEMPLATE: &str = r#"
stage: prod
is-prod: "))prod-flag"
prod-flag: "y"
port: 5432
host: "!lower(DB.LOCAL)"
url: "postgres://))host:))port"
"))stage-db":
  size: "?{is-prod:big:small}"
svc:
  name: "@[-1]"
  "?{is-prod}":
    replicas: 3
"#;

const EXPANDED: &str = r#"
stage: prod
is-prod: "y"
prod-flag: "y"
port: 5432
host: db.local
url: "postgres://db.local:5432"
prod-db:
  size: big
svc:
  name: svc
  replicas: 3
"#;

#[test]
fn test_postgres_example() {
    let mut t = tree("host: db.local\nurl: postgres://))host");
    let passes = Engine::new().expand(&mut t, &ExpandOptions::default()).unwrap();
    assert_eq!(t, tree("host: db.local\nurl: postgres://db.local"));
    assert_eq!(passes, 2);
}

#[test]
fn test_full_template() {
    assert_eq!(expand_with(TEMPLATE, TransformerKind::DEFAULT_ORDER.to_vec()), tree(EXPANDED));
}

#[test]
fn test_expansion_is_idempotent() {
    let engine = Engine::new();
    let options = ExpandOptions::default();
    let once = engine.expanded(&tree(TEMPLATE), &options).unwrap();
    let mut twice = once.clone();
    let passes = engine.expand(&mut twice, &options).unwrap();
    assert_eq!(once, twice);
    assert_eq!(passes, 1);
}

#[test]
fn test_order_does_not_change_the_result() {
    let expected = tree(EXPANDED);

    let mut reversed = TransformerKind::DEFAULT_ORDER.to_vec();
    reversed.reverse();
    assert_eq!(expand_with(TEMPLATE, reversed), expected);

    for shift in 1..TransformerKind::DEFAULT_ORDER.len() {
        let mut rotated = TransformerKind::DEFAULT_ORDER.to_vec();
        rotated.rotate_left(shift);
        assert_eq!(expand_with(TEMPLATE, rotated), expected, "rotated by {}", shift);
    }
}

#[test]
fn test_is_prod_switch() {
    let template = "is-prod: '))flag'\nmode: '?{is-prod:PROD:DEV}'\nflag: ";
    let prod = expand_with(&format!("{}y", template), TransformerKind::DEFAULT_ORDER.to_vec());
    let dev = expand_with(&format!("{}n", template), TransformerKind::DEFAULT_ORDER.to_vec());
    assert_eq!(prod.get("/mode").unwrap(), Value::from("PROD"));
    assert_eq!(dev.get("/mode").unwrap(), Value::from("DEV"));
}

// ============================================================================
// File imports
// ============================================================================

#[test]
fn test_file_imports() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("conf")).unwrap();
    fs::write(
        dir.path().join("conf/base.yaml"),
        "db:\n  host: db.local\n  port: 5432\nlimits: +limits.json#/)\n",
    )
    .unwrap();
    fs::write(dir.path().join("conf/limits.json"), r#"{"max": 10, "min": 1}"#).unwrap();
    fs::write(dir.path().join("motd.txt"), "welcome").unwrap();

    let template = tree("+conf/base.yaml#/):\n  db:\n    port: 6543\nmotd: +motd.txt)");
    let engine = Engine::new().with_resolver(FileResolver::new(dir.path()));
    let expanded = engine.expanded(&template, &ExpandOptions::default()).unwrap();

    assert_eq!(
        expanded,
        tree("db:\n  host: db.local\n  port: 6543\nlimits:\n  max: 10\n  min: 1\nmotd: welcome")
    );
}

#[test]
fn test_missing_file_import() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new().with_resolver(FileResolver::new(dir.path()));
    let err = engine
        .expanded(&tree("a: +missing.yaml#x)"), &ExpandOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Import { ref path, .. } if path == "missing.yaml"));
}

#[test]
fn test_merge() {
    let resolver = MemoryResolver::new()
        .with_tree("base.yaml", tree("svc:\n  db:\n    host: h\n    port: 1"));

    let mut t = tree("svc:\n  db:\n    port: 2\n    user: u");
    merge(&mut t, &resolver, "base.yaml#svc/db/", "/svc/db").unwrap();
    assert_eq!(t, tree("svc:\n  db:\n    port: 1\n    user: u\n    host: h"));

    // a trailing separator replaces the target
    let mut t = tree("svc:\n  db:\n    port: 2\n    user: u");
    merge(&mut t, &resolver, "base.yaml#svc/db/", "/svc/db/").unwrap();
    assert_eq!(t, tree("svc:\n  db:\n    host: h\n    port: 1"));
}

#[test]
fn test_merge_at_root() {
    let resolver = MemoryResolver::new().with_tree("new.yaml", tree("new: 2"));

    let mut t = tree("old: 1");
    merge(&mut t, &resolver, "new.yaml", "").unwrap();
    assert_eq!(t, tree("old: 1\nnew: 2"));

    // the root with a trailing separator replaces the whole tree
    let mut t = tree("old: 1");
    merge(&mut t, &resolver, "new.yaml", "/").unwrap();
    assert_eq!(t, tree("new: 2"));
}

// ============================================================================
// Output and attributes
// ============================================================================

#[test]
fn test_render_expanded() {
    let expanded = expand_with(
        "host: h\nurl: http://))host",
        TransformerKind::DEFAULT_ORDER.to_vec(),
    );
    let json = render(&expanded.clone().into(), Format::Json).unwrap();
    assert_eq!(json, "{\n  \"host\": \"h\",\n  \"url\": \"http://h\"\n}\n");
    assert_eq!(from_json_str(&json).unwrap(), expanded);
    assert_eq!(render(&expanded.into(), Format::Yaml).unwrap(), "host: h\nurl: http://h\n");
}

#[test]
fn test_attributes_of_expanded_tree() {
    let expanded = expand_with(
        "base: /srv\ncache-dir: ))base/cache\nuse-tls: ))tls\ntls: 'on'\napi-url: https://))host/v1\nhost: example.com",
        TransformerKind::DEFAULT_ORDER.to_vec(),
    );
    let attrs = coerce::attributes(&expanded, &CoercionRegistry::with_defaults()).unwrap();
    assert_eq!(attrs.get("CACHE_DIR"), Some(&Typed::Path("/srv/cache".into())));
    assert_eq!(attrs.get("USE_TLS"), Some(&Typed::Bool(true)));
    assert_eq!(
        attrs.get("API_URL").map(ToString::to_string),
        Some("https://example.com/v1".to_string())
    );
    assert_eq!(attrs.get("HOST"), Some(&Typed::Plain(Value::from("example.com"))));
}

// ============================================================================
// Commands
// ============================================================================

#[cfg(feature = "cli")]
mod commands {
    use super::tree;
    use cfgweave::cli::{
        CliError, ExpandRequest, execute_deps, execute_expand, execute_validate, parse_document,
    };
    use std::path::Path;

    #[test]
    fn test_expand_command() {
        let request = ExpandRequest {
            document: tree("host: h\nurl: http://))host"),
            validate: true,
            ..ExpandRequest::default()
        };
        assert_eq!(execute_expand(&request).unwrap(), "host: h\nurl: http://h\n");
    }

    #[test]
    fn test_expand_refuses_invalid_template() {
        let request = ExpandRequest {
            document: tree("a: ))b\nb: ))a"),
            validate: true,
            ..ExpandRequest::default()
        };
        let err = execute_expand(&request).unwrap_err();
        assert!(matches!(err, CliError::Issues { count: 1, .. }));
        assert_eq!(err.to_string(), "1 issue(s) found:\n  circular dependency: a -> b -> a");
    }

    #[test]
    fn test_expand_with_context_and_order() {
        let request = ExpandRequest {
            document: tree("url: http://))host"),
            context: Some(tree("host: ctx")),
            transformers: Some(vec!["values".to_string()]),
            validate: true,
            ..ExpandRequest::default()
        };
        assert_eq!(execute_expand(&request).unwrap(), "url: http://ctx\n");
    }

    #[test]
    fn test_validate_command() {
        assert_eq!(execute_validate(&tree("a: 1"), None).unwrap(), "no issues found\n");
        let err = execute_validate(&tree("url: ))missing-host"), None).unwrap_err();
        assert!(err.to_string().contains("undefined variable: ))missing-host (used at url)"));
    }

    #[test]
    fn test_deps_command() {
        let t = tree("host: h\nurl: ))host\ndsn: ))host");
        assert_eq!(execute_deps(&t, false), "url: ))host\ndsn: ))host\n");
        assert_eq!(execute_deps(&t, true), "))host: url, dsn\n");
    }

    #[test]
    fn test_parse_document_by_extension() {
        let from_json = parse_document(r#"{"a": 1}"#, Some(Path::new("x.json"))).unwrap();
        let from_yaml = parse_document("a: 1", None).unwrap();
        assert_eq!(from_json, from_yaml);
    }
}
