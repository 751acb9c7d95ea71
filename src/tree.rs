//! Ordered hierarchical document store with keychain addressing.
//!
//! A [`Tree`] owns one root [`Mapping`]. Nodes are addressed by
//! [`Keychain`]s in two ways:
//!
//! - **exact**: absolute keychains (`/a/b`) resolve top-down from the root
//! - **search**: the first segment of a relative keychain (`b/c`) is located
//!   anywhere in the tree; the deepest occurrence wins and equal depths go
//!   to the earliest in pre-order
//!
//! Reads of a mapping without a trailing separator return a single-entry
//! wrapper (`get("b")` → `{b: {...}}`); with one they return the contents
//! (`get("b/")` → `{...}`). Scalars and sequences are returned as-is.

use std::cmp::Reverse;

use crate::error::TreeError;
use crate::keychain::Keychain;
use crate::value::{Mapping, Value};

/// Control returned by [`Visitor`] callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// From `pre`: do not descend into this mapping's children.
    Skip,
    /// Abort the whole traversal.
    Stop,
}

/// Sibling order used by [`Tree::visit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Forward,
    /// Iterate each mapping's own children in reverse. Nesting is unchanged.
    Reverse,
}

/// Callbacks for [`Tree::visit`]. Keychains are relative to the root.
pub trait Visitor {
    /// Called for a mapping before its children.
    fn pre(&mut self, _mapping: &Mapping, _keychain: &Keychain) -> Flow {
        Flow::Continue
    }

    /// Called for a mapping after its children.
    fn post(&mut self, _mapping: &Mapping, _keychain: &Keychain) -> Flow {
        Flow::Continue
    }

    /// Called for every non-mapping node. Sequences are leaves.
    fn value(&mut self, _value: &Value, _keychain: &Keychain) -> Flow {
        Flow::Continue
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tree {
    root: Mapping,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    pub fn into_mapping(self) -> Mapping {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Read the node addressed by `keychain`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cfgweave::{convert, Value};
    ///
    /// let tree = convert::from_yaml_str("a: A\nb: {c: BC}").unwrap();
    /// assert_eq!(tree.get("c").unwrap(), Value::from("BC"));
    /// assert_eq!(tree.get("/b/c").unwrap(), Value::from("BC"));
    /// assert!(tree.get("/c").is_err());
    /// ```
    pub fn get(&self, keychain: impl Into<Keychain>) -> Result<Value, TreeError> {
        let keychain = keychain.into();
        let path = self.resolve_path(&keychain)?;
        let Some(last) = path.last() else {
            return Ok(Value::Mapping(self.root.clone()));
        };
        let node = lookup(&self.root, &path).ok_or_else(|| TreeError::not_found(&keychain))?;
        Ok(shape(keychain.is_trailing(), last, node.clone()))
    }

    /// Write `value` at `keychain` (the write form of `get`).
    ///
    /// Existing scalars and sequences are overwritten, an existing mapping is
    /// overlaid, and missing intermediate mappings are created. Returns what
    /// [`get`](Self::get) returns for the same keychain afterwards.
    ///
    /// Relative keychains that do not resolve yet are anchored at the first
    /// mapping-valued match of their first segment, or at the root when
    /// there is none.
    pub fn set(&mut self, keychain: impl Into<Keychain>, value: Value) -> Result<Value, TreeError> {
        let keychain = keychain.into();
        if keychain.is_root() {
            self.write_root(value)?;
            return Ok(Value::Mapping(self.root.clone()));
        }
        let path = self.write_path(&keychain);
        self.write(&path, value)?;
        self.get(Keychain::absolute(path).with_trailing(keychain.is_trailing()))
    }

    /// Remove and return the node addressed by `keychain`.
    ///
    /// Uses the same addressing and result shape as [`get`](Self::get).
    /// Popping the root empties the tree and returns its contents.
    pub fn pop(&mut self, keychain: impl Into<Keychain>) -> Result<Value, TreeError> {
        let keychain = keychain.into();
        let path = self.resolve_path(&keychain)?;
        let Some((last, parents)) = path.split_last() else {
            return Ok(Value::Mapping(std::mem::take(&mut self.root)));
        };
        let parent = if parents.is_empty() {
            &mut self.root
        } else {
            lookup_mut(&mut self.root, parents)
                .and_then(Value::as_mapping_mut)
                .ok_or_else(|| TreeError::not_found(&keychain))?
        };
        let node = parent
            .remove(last)
            .ok_or_else(|| TreeError::not_found(&keychain))?;
        Ok(shape(keychain.is_trailing(), last, node))
    }

    /// Recursively merge `other` into the root. Incoming values win.
    pub fn overlay(&mut self, other: Tree) {
        self.root.overlay(other.root);
    }

    /// Recursively merge `value` at `keychain`, with [`set`](Self::set)
    /// addressing.
    pub fn overlay_at(
        &mut self,
        keychain: impl Into<Keychain>,
        value: Value,
    ) -> Result<(), TreeError> {
        self.set(keychain, value).map(|_| ())
    }

    /// Search for an unqualified key anywhere in the tree.
    ///
    /// Returns the absolute keychain and value of the deepest occurrence;
    /// ties go to the earliest in pre-order.
    pub fn dfs(&self, key: &str) -> Result<(Keychain, &Value), TreeError> {
        let path = self
            .search(key)
            .into_iter()
            .next()
            .ok_or_else(|| TreeError::not_found(key))?;
        let value = lookup(&self.root, &path).ok_or_else(|| TreeError::not_found(key))?;
        Ok((Keychain::absolute(path), value))
    }

    /// Absolute keychain that a read of `keychain` would address.
    pub fn resolve(&self, keychain: impl Into<Keychain>) -> Result<Keychain, TreeError> {
        let keychain = keychain.into();
        self.resolve_path(&keychain)
            .map(|path| Keychain::absolute(path).with_trailing(keychain.is_trailing()))
    }

    pub fn contains(&self, keychain: impl Into<Keychain>) -> bool {
        self.resolve_path(&keychain.into()).is_ok()
    }

    /// Keys of the addressed mapping, or of the root. Non-mappings have none.
    pub fn keys(&self, keychain: impl Into<Keychain>) -> Result<Vec<String>, TreeError> {
        let keychain = keychain.into();
        let path = self.resolve_path(&keychain)?;
        let mapping = if path.is_empty() {
            Some(&self.root)
        } else {
            lookup(&self.root, &path).and_then(Value::as_mapping)
        };
        Ok(mapping
            .map(|m| m.keys().map(str::to_string).collect())
            .unwrap_or_default())
    }

    /// Mutable access to the mapping at `keychain` (the root for an empty one).
    pub fn mapping_mut(
        &mut self,
        keychain: impl Into<Keychain>,
    ) -> Result<&mut Mapping, TreeError> {
        let keychain = keychain.into();
        let path = self.resolve_path(&keychain)?;
        if path.is_empty() {
            return Ok(&mut self.root);
        }
        match lookup_mut(&mut self.root, &path) {
            Some(Value::Mapping(m)) => Ok(m),
            Some(other) => Err(TreeError::StructuralConflict {
                keychain: keychain.to_string(),
                found: other.type_name(),
            }),
            None => Err(TreeError::not_found(&keychain)),
        }
    }

    /// Empty the tree, optionally keeping one subtree at its absolute position.
    pub fn reset(&mut self, keep: Option<&Keychain>) -> Result<(), TreeError> {
        let kept = match keep {
            Some(keychain) => {
                let path = self.resolve_path(keychain)?;
                let node = lookup(&self.root, &path).cloned();
                node.map(|node| (path, node))
            }
            None => None,
        };
        self.root.clear();
        if let Some((path, node)) = kept {
            self.write(&path, node)?;
        }
        Ok(())
    }

    /// Read `keychain`, writing `default` there first when it is missing.
    pub fn get_or_set(
        &mut self,
        keychain: impl Into<Keychain>,
        default: Value,
    ) -> Result<Value, TreeError> {
        let keychain = keychain.into();
        if self.contains(&keychain) {
            self.get(keychain)
        } else {
            self.set(keychain, default)
        }
    }

    /// Append to the sequence at `keychain`, creating or promoting it.
    ///
    /// A scalar target becomes the first element; an appended sequence is
    /// extended element-wise. Appending to a mapping is a structural conflict.
    pub fn append(
        &mut self,
        keychain: impl Into<Keychain>,
        value: Value,
    ) -> Result<Value, TreeError> {
        let keychain = keychain.into();
        let incoming = match value {
            Value::Sequence(items) => items,
            other => vec![other],
        };
        let Ok(path) = self.resolve_path(&keychain) else {
            return self.set(keychain, Value::Sequence(incoming));
        };
        let slot = lookup_mut(&mut self.root, &path)
            .ok_or_else(|| TreeError::not_found(&keychain))?;
        match &mut *slot {
            Value::Sequence(items) => items.extend(incoming),
            Value::Mapping(_) => {
                return Err(TreeError::StructuralConflict {
                    keychain: keychain.to_string(),
                    found: "mapping",
                });
            }
            scalar => {
                let mut items = vec![std::mem::take(scalar)];
                items.extend(incoming);
                *scalar = Value::Sequence(items);
            }
        }
        Ok(slot.clone())
    }

    /// Walk the tree, calling `visitor` for every mapping and leaf.
    pub fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V, order: Order) {
        visit_mapping(&self.root, &Keychain::root(), visitor, order);
    }

    /// Leaf values with their keychains, in visit order.
    ///
    /// Keychains are absolute unless `relative` is set.
    pub fn flatten(&self, relative: bool) -> Vec<(Keychain, Value)> {
        struct Leaves {
            relative: bool,
            leaves: Vec<(Keychain, Value)>,
        }

        impl Visitor for Leaves {
            fn value(&mut self, value: &Value, keychain: &Keychain) -> Flow {
                let keychain = if self.relative {
                    keychain.clone()
                } else {
                    keychain.to_absolute()
                };
                self.leaves.push((keychain, value.clone()));
                Flow::Continue
            }
        }

        let mut collector = Leaves {
            relative,
            leaves: Vec::new(),
        };
        self.visit(&mut collector, Order::Forward);
        collector.leaves
    }

    /// All absolute paths ending in `key`, deepest first, then pre-order.
    fn search(&self, key: &str) -> Vec<Vec<String>> {
        fn collect(
            mapping: &Mapping,
            key: &str,
            prefix: &mut Vec<String>,
            found: &mut Vec<Vec<String>>,
        ) {
            for (k, v) in mapping.iter() {
                prefix.push(k.to_string());
                if k == key {
                    found.push(prefix.clone());
                }
                if let Value::Mapping(child) = v {
                    collect(child, key, prefix, found);
                }
                prefix.pop();
            }
        }

        let mut found = Vec::new();
        collect(&self.root, key, &mut Vec::new(), &mut found);
        found.sort_by_key(|path| Reverse(path.len()));
        found
    }

    fn resolve_path(&self, keychain: &Keychain) -> Result<Vec<String>, TreeError> {
        let segments = keychain.segments();
        let Some((first, rest)) = segments.split_first() else {
            return Ok(Vec::new());
        };
        if keychain.is_absolute() {
            return match lookup(&self.root, segments) {
                Some(_) => Ok(segments.to_vec()),
                None => Err(TreeError::not_found(keychain)),
            };
        }
        self.search(first)
            .into_iter()
            .map(|mut path| {
                path.extend(rest.iter().cloned());
                path
            })
            .find(|path| lookup(&self.root, path).is_some())
            .ok_or_else(|| TreeError::not_found(keychain))
    }

    fn write_path(&self, keychain: &Keychain) -> Vec<String> {
        if keychain.is_absolute() {
            return keychain.segments().to_vec();
        }
        if let Ok(path) = self.resolve_path(keychain) {
            return path;
        }
        let segments = keychain.segments();
        let (first, rest) = match segments.split_first() {
            Some(split) => split,
            None => return Vec::new(),
        };
        self.search(first)
            .into_iter()
            .find(|path| matches!(lookup(&self.root, path), Some(Value::Mapping(_))))
            .map(|mut path| {
                path.extend(rest.iter().cloned());
                path
            })
            .unwrap_or_else(|| segments.to_vec())
    }

    fn write_root(&mut self, value: Value) -> Result<(), TreeError> {
        match value {
            Value::Mapping(m) => {
                self.root.overlay(m);
                Ok(())
            }
            other => Err(TreeError::RootWriteConflict {
                found: other.type_name(),
            }),
        }
    }

    fn write(&mut self, path: &[String], value: Value) -> Result<(), TreeError> {
        let Some((last, parents)) = path.split_last() else {
            return self.write_root(value);
        };
        let mut mapping = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            if !mapping.contains_key(segment) {
                mapping.insert(segment.clone(), Value::Mapping(Mapping::new()));
            }
            mapping = match mapping.get_mut(segment) {
                Some(Value::Mapping(m)) => m,
                Some(other) => {
                    return Err(TreeError::StructuralConflict {
                        keychain: Keychain::absolute(&path[..=depth]).to_string(),
                        found: other.type_name(),
                    });
                }
                None => return Err(TreeError::not_found(Keychain::absolute(&path[..=depth]))),
            };
        }
        match mapping.get_mut(last) {
            Some(slot) => slot.overlay(value),
            None => {
                mapping.insert(last.clone(), value);
            }
        }
        Ok(())
    }
}

impl From<Mapping> for Tree {
    fn from(root: Mapping) -> Self {
        Tree { root }
    }
}

impl From<Tree> for Value {
    fn from(tree: Tree) -> Self {
        Value::Mapping(tree.root)
    }
}

impl TryFrom<Value> for Tree {
    type Error = TreeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Mapping(root) => Ok(Tree { root }),
            other => Err(TreeError::RootWriteConflict {
                found: other.type_name(),
            }),
        }
    }
}

fn shape(trailing: bool, key: &str, node: Value) -> Value {
    match node {
        Value::Mapping(contents) if !trailing => {
            let mut wrapper = Mapping::new();
            wrapper.insert(key, Value::Mapping(contents));
            Value::Mapping(wrapper)
        }
        other => other,
    }
}

fn lookup<'a>(mapping: &'a Mapping, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut node = mapping.get(first)?;
    for segment in rest {
        node = node.as_mapping()?.get(segment)?;
    }
    Some(node)
}

fn lookup_mut<'a>(mapping: &'a mut Mapping, path: &[String]) -> Option<&'a mut Value> {
    let (first, rest) = path.split_first()?;
    let mut node = mapping.get_mut(first)?;
    for segment in rest {
        node = node.as_mapping_mut()?.get_mut(segment)?;
    }
    Some(node)
}

fn visit_mapping<V: Visitor + ?Sized>(
    mapping: &Mapping,
    keychain: &Keychain,
    visitor: &mut V,
    order: Order,
) -> Flow {
    match visitor.pre(mapping, keychain) {
        Flow::Stop => return Flow::Stop,
        Flow::Skip => return visitor.post(mapping, keychain),
        Flow::Continue => {}
    }

    let mut children: Vec<(&str, &Value)> = mapping.iter().collect();
    if order == Order::Reverse {
        children.reverse();
    }

    for (key, child) in children {
        let child_keychain = keychain.child(key);
        let flow = match child {
            Value::Mapping(m) => visit_mapping(m, &child_keychain, visitor, order),
            leaf => visitor.value(leaf, &child_keychain),
        };
        if flow == Flow::Stop {
            return Flow::Stop;
        }
    }

    visitor.post(mapping, keychain)
}
