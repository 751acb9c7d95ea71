//! # Template Grammar - Syntax Tree
//!
//! Types produced by the [`lexer`](crate::lexer) and
//! [`parser`](crate::parser) for the mini-languages embedded in keys and
//! values of a template.
//!
//! - **[tokens]** - fragments of a scalar or key: literal text and tokens
//! - **[condition]** - boolean expressions used by conditional tokens
//!
//! ## Token kinds
//!
//! ```text
//! ))host                 variable, searched anywhere in the tree
//! )){/svc/db/host}       variable, addressed by keychain
//! ))hosts@[-1]           variable, last element of a sequence
//! @  @[1]                context: the enclosing keychain or one segment
//! ?{is-prod:PROD:DEV}    value conditional
//! ?{env == prod}         key conditional (gates the subtree below it)
//! !upper(abc))           dynamic invocation
//! +base.yaml#svc/)       import, with an optional selector
//! +motd.txt)             plain-text inclusion
//! ```
//!
//! A string is tokenized into an ordered list of literal and token
//! fragments. Anything malformed (unterminated braces or parentheses, bad
//! key characters) is not a token and stays literal text.
pub mod condition;
pub mod tokens;

pub use condition::{CompareOp, Condition};
pub use tokens::{Fragment, Token, TokenKind};
