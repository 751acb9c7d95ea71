use std::fmt;

use crate::keychain::Keychain;

/// One span of a tokenized string.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Text copied through unchanged
    Literal(String),

    /// A recognised token
    Token(Token),
}

impl Fragment {
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Fragment::Token(token) => Some(token),
            Fragment::Literal(_) => None,
        }
    }
}

/// A recognised token and the exact source text it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub raw: String,
}

impl Token {
    pub fn is_variable(&self) -> bool {
        matches!(self.kind, TokenKind::Variable { .. })
    }

    pub fn is_import(&self) -> bool {
        matches!(self.kind, TokenKind::Import { .. })
    }

    /// Keychain a variable token addresses.
    pub fn target(&self) -> Option<&Keychain> {
        match &self.kind {
            TokenKind::Variable { target, .. } => Some(target),
            _ => None,
        }
    }

    /// The variable with any index dropped, braces kept only where a bare
    /// key cannot express the target.
    pub fn normalized(&self) -> Token {
        let TokenKind::Variable { target, .. } = &self.kind else {
            return self.clone();
        };
        let braced = target.is_absolute() || target.is_trailing() || target.len() != 1;
        let raw = if braced {
            format!(")){{{}}}", target)
        } else {
            format!(")){}", target)
        };
        Token {
            kind: TokenKind::Variable {
                target: target.clone(),
                braced,
                index: None,
            },
            raw,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Variable reference
    ///
    /// A bare key is located by search; a braced keychain uses tree
    /// addressing as written. The index selects a sequence element,
    /// negative indices counting from the end.
    ///
    /// # Examples
    /// ```text
    /// ))host
    /// )){/svc/db/port}
    /// ))replicas@[0]
    /// ```
    Variable {
        target: Keychain,
        braced: bool,
        index: Option<i64>,
    },

    /// Context reference
    ///
    /// `@` is the keychain of the enclosing mapping, `@[n]` one of its
    /// segments.
    ///
    /// # Examples
    /// ```text
    /// @
    /// @[0]
    /// @[-1]
    /// ```
    Context { index: Option<i64> },

    /// Conditional
    ///
    /// Without branches this is the key form that gates a subtree.
    ///
    /// # Examples
    /// ```text
    /// ?{use-tls}
    /// ?{env == prod:PROD}
    /// ?{is-prod & !use-debug:on:off}
    /// ```
    Conditional {
        condition: String,
        then: Option<String>,
        otherwise: Option<String>,
    },

    /// Dynamic invocation of a registered handler
    ///
    /// # Examples
    /// ```text
    /// !upper(abc))
    /// ))!replace(a-b,-,_))
    /// ```
    Invocation { name: String, args: Vec<String> },

    /// Import of an external document
    ///
    /// With a selector (possibly empty) the loaded document is addressed by
    /// it; without one the file's text is included verbatim.
    ///
    /// # Examples
    /// ```text
    /// +base.yaml#)
    /// +shared/db.yaml#postgres/)
    /// +banner.txt)
    /// ```
    Import {
        path: String,
        selector: Option<String>,
    },
}
