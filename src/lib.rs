//! Template expansion for hierarchical configuration documents.
//!
//! A template is a [`Tree`] of ordered mappings whose keys and string values
//! may carry tokens (variables, context references, conditionals,
//! invocations and imports). The [`Engine`] runs a fixed sequence of
//! transformers over the tree until nothing changes; the [`Validator`]
//! reports undefined and circular references before that happens.

pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod coerce;
pub mod convert;
pub mod engine;
pub mod error;
pub mod host;
pub mod keychain;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod transformers;
pub mod tree;
pub mod validator;
pub mod value;

pub use ast::{Condition, Fragment, Token, TokenKind};
pub use coerce::{CoercionRegistry, Typed};
pub use engine::{Engine, ExpandOptions, merge};
pub use error::{Error, Result, TreeError};
pub use host::{FileResolver, ImportResolver, Imported, InvocationRegistry, MemoryResolver};
pub use keychain::Keychain;
pub use output::Format;
pub use transformers::TransformerKind;
pub use tree::{Flow, Order, Tree, Visitor};
pub use validator::{Issue, IssueKind, Validator};
pub use value::{Mapping, Value};
