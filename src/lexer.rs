use crate::{
    ast::{Fragment, Token, TokenKind},
    keychain::{Keychain, is_key_char, is_key_start, is_valid_keychain},
    parser::parse_condition,
};

/// Scanner splitting a scalar or key into literal and token fragments.
///
/// Recognition never fails: text that does not form a complete token is
/// kept as literal. A token whose parameters still contain another token is
/// not recognised, so inner tokens are resolved first and the outer one
/// matches on a later pass.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.input.get(index).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.input[start..end].iter().collect()
    }

    fn find(&self, from: usize, target: char) -> Option<usize> {
        (from..self.input.len()).find(|&i| self.input[i] == target)
    }

    /// Read `[A-Za-z0-9_][A-Za-z0-9_.-]*` starting at `at`.
    fn read_key(&self, at: usize) -> Option<(String, usize)> {
        if !self.char_at(at).is_some_and(is_key_start) {
            return None;
        }
        let mut end = at + 1;
        while self.char_at(end).is_some_and(is_key_char) {
            end += 1;
        }
        Some((self.text(at, end), end))
    }

    /// Read an `@[n]` index suffix starting at `at`.
    fn read_index(&self, at: usize) -> Option<(i64, usize)> {
        if self.char_at(at) != Some('@') || self.char_at(at + 1) != Some('[') {
            return None;
        }
        let close = self.find(at + 2, ']')?;
        let index = self.text(at + 2, close).parse::<i64>().ok()?;
        Some((index, close + 1))
    }

    /// `))key`, `)){keychain}`, optionally `@[n]`, or `))!name(args))`.
    fn read_variable(&self, start: usize) -> Option<(TokenKind, usize)> {
        let at = start + 2;
        let (target, braced, end) = match self.char_at(at)? {
            '!' => return self.read_invocation(at),
            '{' => {
                let close = self.find(at + 1, '}')?;
                let inner = self.text(at + 1, close);
                if !is_valid_keychain(&inner) {
                    return None;
                }
                (Keychain::parse(&inner), true, close + 1)
            }
            _ => {
                let (key, end) = self.read_key(at)?;
                (Keychain::relative([key]), false, end)
            }
        };
        let (index, end) = match self.read_index(end) {
            Some((index, end)) => (Some(index), end),
            None => (None, end),
        };
        Some((
            TokenKind::Variable {
                target,
                braced,
                index,
            },
            end,
        ))
    }

    /// `@[n]`, or a bare `@` that is not part of a word.
    fn read_context(&self, start: usize) -> Option<(TokenKind, usize)> {
        if let Some((index, end)) = self.read_index(start) {
            return Some((TokenKind::Context { index: Some(index) }, end));
        }
        let before = start.checked_sub(1).and_then(|i| self.char_at(i));
        let after = self.char_at(start + 1);
        if before.is_some_and(is_key_char) || after.is_some_and(|c| is_key_char(c) || c == '[') {
            return None;
        }
        Some((TokenKind::Context { index: None }, start + 1))
    }

    /// `?{condition}`, `?{condition:then}` or `?{condition:then:else}`.
    fn read_conditional(&self, start: usize) -> Option<(TokenKind, usize)> {
        let close = self.find(start + 2, '}')?;
        let inner = self.text(start + 2, close);
        if has_nested_token(&inner) {
            return None;
        }
        let mut parts = inner.split(':').map(str::trim);
        let condition = parts.next()?.to_string();
        let then = parts.next().map(str::to_string);
        let otherwise = parts.next().map(str::to_string);
        if parts.next().is_some() || parse_condition(&condition).is_err() {
            return None;
        }
        Some((
            TokenKind::Conditional {
                condition,
                then,
                otherwise,
            },
            close + 1,
        ))
    }

    /// `!name(a,b))` starting at the `!`. A single closing paren is also accepted.
    fn read_invocation(&self, bang: usize) -> Option<(TokenKind, usize)> {
        let (name, open) = self.read_key(bang + 1)?;
        if self.char_at(open) != Some('(') {
            return None;
        }
        let close = self.find(open + 1, ')')?;
        // `!f())key)`: the argument list starts with a variable
        if self.char_at(close + 1) == Some(')')
            && self
                .char_at(close + 2)
                .is_some_and(|c| is_key_start(c) || c == '{' || c == '!')
        {
            return None;
        }
        let inner = self.text(open + 1, close);
        if has_nested_token(&inner) {
            return None;
        }
        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(|arg| arg.trim().to_string()).collect()
        };
        let end = if self.char_at(close + 1) == Some(')') {
            close + 2
        } else {
            close + 1
        };
        Some((TokenKind::Invocation { name, args }, end))
    }

    /// `+path#selector)` or `+path)`, delimited by whitespace on both sides.
    fn read_import(&self, start: usize) -> Option<(TokenKind, usize)> {
        if start > 0 && !self.char_at(start - 1).is_some_and(char::is_whitespace) {
            return None;
        }
        let mut end = start + 1;
        while self
            .char_at(end)
            .is_some_and(|c| !c.is_whitespace() && c != '#' && c != ')')
        {
            end += 1;
        }
        let path = self.text(start + 1, end);
        if path.is_empty() || has_nested_token(&path) {
            return None;
        }
        let selector = if self.char_at(end) == Some('#') {
            let from = end + 1;
            end = from;
            while self.char_at(end).is_some_and(|c| !c.is_whitespace() && c != ')') {
                end += 1;
            }
            Some(self.text(from, end))
        } else {
            None
        };
        if selector.as_deref().is_some_and(has_nested_token) || self.char_at(end) != Some(')') {
            return None;
        }
        end += 1;
        if self.char_at(end).is_some_and(|c| !c.is_whitespace()) {
            return None;
        }
        Some((TokenKind::Import { path, selector }, end))
    }

    fn scan_token(&self) -> Option<(Token, usize)> {
        let start = self.position;
        let (kind, end) = match self.current_char()? {
            ')' if self.char_at(start + 1) == Some(')') => self.read_variable(start)?,
            '@' => self.read_context(start)?,
            '?' if self.char_at(start + 1) == Some('{') => self.read_conditional(start)?,
            '!' => self.read_invocation(start)?,
            '+' => self.read_import(start)?,
            _ => return None,
        };
        let raw = self.text(start, end);
        Some((Token { kind, raw }, end))
    }

    pub fn tokenize(mut self) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        let mut literal = String::new();

        while let Some(ch) = self.current_char() {
            match self.scan_token() {
                Some((token, end)) => {
                    if !literal.is_empty() {
                        fragments.push(Fragment::Literal(std::mem::take(&mut literal)));
                    }
                    fragments.push(Fragment::Token(token));
                    self.position = end;
                }
                None => {
                    literal.push(ch);
                    self.advance();
                }
            }
        }

        if !literal.is_empty() {
            fragments.push(Fragment::Literal(literal));
        }
        fragments
    }
}

/// Split `text` into literal and token fragments.
pub fn tokenize(text: &str) -> Vec<Fragment> {
    Lexer::new(text).tokenize()
}

/// Tokens of `text`, in order.
pub fn tokens(text: &str) -> Vec<Token> {
    tokenize(text)
        .into_iter()
        .filter_map(|fragment| match fragment {
            Fragment::Token(token) => Some(token),
            Fragment::Literal(_) => None,
        })
        .collect()
}

/// The token `text` consists of, when it is exactly one token.
pub fn whole_token(text: &str) -> Option<Token> {
    let mut fragments = tokenize(text);
    match (fragments.pop(), fragments.is_empty()) {
        (Some(Fragment::Token(token)), true) => Some(token),
        _ => None,
    }
}

pub fn has_tokens(text: &str) -> bool {
    tokenize(text).iter().any(|fragment| fragment.as_token().is_some())
}

fn has_nested_token(text: &str) -> bool {
    text.contains("))") || text.contains("?{") || has_tokens(text)
}

#[test]
fn test_literal_only() {
    assert_eq!(
        tokenize("plain text, user@host"),
        vec![Fragment::Literal("plain text, user@host".to_string())]
    );
}

#[test]
fn test_variable_in_text() {
    let fragments = tokenize("postgres://))host:5432");
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[0], Fragment::Literal("postgres://".to_string()));
    assert_eq!(fragments[2], Fragment::Literal(":5432".to_string()));
    let token = fragments[1].as_token().unwrap();
    assert_eq!(token.raw, "))host");
    assert_eq!(token.target(), Some(&Keychain::parse("host")));
}

#[test]
fn test_unterminated_tokens_stay_literal() {
    for text in [")){a/b", "?{is-prod:A", "!upper(abc", "+base.yaml#svc"] {
        assert!(!has_tokens(text), "{} should not tokenize", text);
    }
}

#[test]
fn test_inner_token_first() {
    let tokens = tokens("?{))flag:A:B}");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].raw, "))flag");
}
