use crate::{
    ast::{CompareOp, Condition},
    error::{Error, Result},
    keychain::{Keychain, is_valid_keychain},
};

/// Recursive-descent parser for the condition part of `?{...}` tokens.
///
/// ```text
/// condition := and ('|' and)*
/// and       := unary ('&' unary)*
/// unary     := '!' unary | term
/// term      := key (('==' | '!=') literal)?
/// ```
pub struct Parser {
    input: Vec<char>,
    position: usize,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        Parser {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn error(&self, message: impl ToString) -> Error {
        Error::Condition {
            text: self.input.iter().collect(),
            message: message.to_string(),
        }
    }

    /// Read up to (not including) any of `stops`, trimmed.
    fn read_operand(&mut self, stops: &[char]) -> String {
        let start = self.position;
        while self.current_char().is_some_and(|c| !stops.contains(&c)) {
            self.advance();
        }
        self.input[start..self.position]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn parse_term(&mut self) -> Result<Condition> {
        let operand = self.read_operand(&['&', '|', '=', '!']);
        if !is_valid_keychain(&operand) {
            return Err(self.error(format!("expected a key, found '{}'", operand)));
        }
        let key = Keychain::parse(&operand);

        let op = match (self.current_char(), self.peek_char(1)) {
            (Some('='), Some('=')) => CompareOp::Equal,
            (Some('!'), Some('=')) => CompareOp::NotEqual,
            (Some('='), _) => return Err(self.error("unexpected '=' (did you mean '=='?)")),
            _ => return Ok(Condition::Present(key)),
        };
        self.advance();
        self.advance();

        let literal = self.read_operand(&['&', '|']);
        if literal.is_empty() {
            return Err(self.error(format!("missing value after '{}'", operand)));
        }
        Ok(Condition::Compare {
            key,
            op,
            literal: unquote(&literal).to_string(),
        })
    }

    fn parse_unary(&mut self) -> Result<Condition> {
        self.skip_whitespace();
        if self.current_char() == Some('!') {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_term()
    }

    fn parse_and(&mut self) -> Result<Condition> {
        let mut left = self.parse_unary()?;

        while self.current_char() == Some('&') {
            self.advance();
            let right = self.parse_unary()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Condition> {
        let mut left = self.parse_and()?;

        while self.current_char() == Some('|') {
            self.advance();
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    pub fn parse(mut self) -> Result<Condition> {
        let condition = self.parse_or()?;
        self.skip_whitespace();
        match self.current_char() {
            None => Ok(condition),
            Some(ch) => Err(self.error(format!(
                "unexpected '{}' at position {}",
                ch, self.position
            ))),
        }
    }
}

/// Parse a condition expression such as `is-prod & env != dev`.
pub fn parse_condition(input: &str) -> Result<Condition> {
    Parser::new(input).parse()
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}
