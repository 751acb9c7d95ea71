//! Host collaborators injected into the [`Engine`](crate::Engine): import
//! resolution and named dynamic invocations.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    convert,
    error::{Error, Result},
    keychain::is_valid_key,
    tree::Tree,
    value::Value,
};

/// A document returned by an [`ImportResolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct Imported {
    /// The selected part of the loaded document
    pub value: Value,

    /// Directory that relative imports inside `value` are relative to, in
    /// the resolver's own path space
    pub base_dir: Option<PathBuf>,
}

/// Loads documents named by import tokens.
pub trait ImportResolver {
    /// Load `path` and address it with `selector` (tree addressing; empty
    /// selects the whole document).
    fn resolve(&self, path: &str, selector: &str) -> Result<Imported>;

    /// Load `path` as plain text.
    fn read_text(&self, path: &str) -> Result<String>;
}

fn import_error(path: &str, message: impl ToString) -> Error {
    Error::Import {
        path: path.to_string(),
        message: message.to_string(),
    }
}

fn parent_dir(path: &str) -> Option<PathBuf> {
    Path::new(path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// Apply an import selector to a loaded document.
pub fn select(path: &str, document: Value, selector: &str) -> Result<Value> {
    if selector.is_empty() {
        return Ok(document);
    }
    let tree = convert::tree_from_value(document)
        .map_err(|_| {
            import_error(path, format!("selector '{}' needs a mapping document", selector))
        })?;
    tree.get(selector)
        .map_err(|e| import_error(path, format!("selector '{}': {}", selector, e)))
}

/// Resolves import paths against a root directory on disk.
///
/// `.json` files are parsed as JSON; everything else as YAML.
#[derive(Debug, Clone)]
pub struct FileResolver {
    root_dir: PathBuf,
}

impl FileResolver {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        FileResolver {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root_dir.join(path)
    }

    fn read(&self, path: &str) -> Result<String> {
        let full = self.full_path(path);
        debug!(path = %full.display(), "reading import");
        fs::read_to_string(&full).map_err(|e| import_error(path, e))
    }
}

impl ImportResolver for FileResolver {
    fn resolve(&self, path: &str, selector: &str) -> Result<Imported> {
        let text = self.read(path)?;
        let is_json = Path::new(path)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let document = if is_json {
            convert::value_from_json_str(&text)
        } else {
            convert::value_from_yaml_str(&text)
        }
        .map_err(|e| import_error(path, e))?;

        Ok(Imported {
            value: select(path, document, selector)?,
            base_dir: parent_dir(path),
        })
    }

    fn read_text(&self, path: &str) -> Result<String> {
        self.read(path)
    }
}

/// In-memory documents and texts keyed by import path.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    documents: HashMap<String, Value>,
    texts: HashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: &str, document: impl Into<Value>) -> Self {
        self.documents.insert(normalize(path), document.into());
        self
    }

    pub fn with_tree(self, path: &str, tree: Tree) -> Self {
        self.with_document(path, tree)
    }

    pub fn with_text(mut self, path: &str, text: &str) -> Self {
        self.texts.insert(normalize(path), text.to_string());
        self
    }
}

fn normalize(path: &str) -> String {
    path.strip_prefix("./").unwrap_or(path).to_string()
}

impl ImportResolver for MemoryResolver {
    fn resolve(&self, path: &str, selector: &str) -> Result<Imported> {
        let document = self
            .documents
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| import_error(path, "no such document"))?;
        Ok(Imported {
            value: select(path, document, selector)?,
            base_dir: parent_dir(&normalize(path)),
        })
    }

    fn read_text(&self, path: &str) -> Result<String> {
        self.texts
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| import_error(path, "no such text"))
    }
}

/// Handler behind a dynamic invocation: arguments in, text out.
pub type InvocationFn = Box<dyn Fn(&[String]) -> std::result::Result<String, String> + Send + Sync>;

/// Named computations callable from `!name(args))` tokens.
///
/// # Examples
///
/// ```
/// use cfgweave::InvocationRegistry;
///
/// let mut registry = InvocationRegistry::with_builtins();
/// registry
///     .register("join", |args: &[String]| Ok(args.join("-")))
///     .unwrap();
///
/// assert_eq!(registry.invoke("upper", &["db".to_string()]).unwrap(), "DB");
/// assert!(registry.register("upper", |_: &[String]| Ok(String::new())).is_err());
/// assert!(registry.invoke("missing", &[]).is_err());
/// ```
#[derive(Default)]
pub struct InvocationRegistry {
    handlers: BTreeMap<String, InvocationFn>,
}

impl InvocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `upper`, `lower`, `replace` and `env`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, InvocationFn); 4] = [
            ("upper", Box::new(|args: &[String]| single(args, "upper").map(str::to_uppercase))),
            ("lower", Box::new(|args: &[String]| single(args, "lower").map(str::to_lowercase))),
            (
                "replace",
                Box::new(|args: &[String]| match args {
                    [text, from, to] => Ok(text.replace(from.as_str(), to)),
                    _ => Err(format!("replace expects 3 arguments, got {}", args.len())),
                }),
            ),
            (
                "env",
                Box::new(|args: &[String]| {
                    let name = single(args, "env")?;
                    std::env::var(name)
                        .map_err(|_| format!("environment variable '{}' is not set", name))
                }),
            ),
        ];
        for (name, handler) in builtins {
            registry.handlers.insert(name.to_string(), handler);
        }
        registry
    }

    /// Register `handler` under `name`. Names use the key charset and must
    /// be unique.
    pub fn register<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&[String]) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        if !is_valid_key(name) {
            return Err(Error::Registration {
                message: format!("invalid invocation name '{}'", name),
            });
        }
        if self.handlers.contains_key(name) {
            return Err(Error::Registration {
                message: format!("invocation '{}' is already registered", name),
            });
        }
        self.handlers.insert(name.to_string(), Box::new(handler));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn invoke(&self, name: &str, args: &[String]) -> Result<String> {
        let handler = self.handlers.get(name).ok_or_else(|| Error::Lookup {
            name: name.to_string(),
        })?;
        handler(args).map_err(|message| Error::Invocation {
            name: name.to_string(),
            message,
        })
    }
}

impl fmt::Debug for InvocationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

fn single<'a>(args: &'a [String], name: &str) -> std::result::Result<&'a str, String> {
    match args {
        [arg] => Ok(arg),
        _ => Err(format!("{} expects 1 argument, got {}", name, args.len())),
    }
}
