use crate::keychain::Keychain;

/// Comparison operators allowed in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`==`)
    Equal,
    /// Not equal (`!=`)
    NotEqual,
}

/// Parsed condition of a `?{...}` token.
///
/// `|` binds looser than `&`, and `!` negates a single term.
///
/// ```text
/// use-tls                 Present
/// env == prod             Compare
/// !is-prod                Not(Present)
/// a & b | c               Or(And(a, b), c)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Key presence, or the truth of an `is-`/`use-` key
    Present(Keychain),

    Compare {
        key: Keychain,
        op: CompareOp,
        literal: String,
    },

    Not(Box<Condition>),

    And(Box<Condition>, Box<Condition>),

    Or(Box<Condition>, Box<Condition>),
}
