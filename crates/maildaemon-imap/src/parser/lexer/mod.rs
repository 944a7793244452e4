//! IMAP lexer for tokenizing server responses.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// IMAP lexer over one complete response (literals included).
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the unread input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips up to `n` bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match byte {
            b' ' => Some(Token::Space),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' if self.peek_at(1) == Some(b'\n') => {
                self.pos += 2;
                Ok(Token::Crlf)
            }
            b'\n' => {
                self.pos += 1;
                Ok(Token::Crlf)
            }
            b'"' => Ok(self.read_quoted_string()),
            b'{' => self.read_literal(),
            b'\\' if self.peek_at(1) == Some(b'*') => {
                let start = self.pos;
                self.pos += 2;
                Ok(Token::Atom(self.slice_str(start)?))
            }
            _ if is_atom_char(byte) => self.read_atom(),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    /// Reads a quoted string. Unknown escapes keep the escaped byte and
    /// invalid UTF-8 is replaced.
    fn read_quoted_string(&mut self) -> Token<'a> {
        self.pos += 1;
        let mut bytes = Vec::new();

        while let Some(b) = self.advance() {
            match b {
                b'"' => break,
                b'\\' => {
                    if let Some(escaped) = self.advance() {
                        bytes.push(escaped);
                    }
                }
                _ => bytes.push(b),
            }
        }

        Token::QuotedString(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads `{n}` or `{n+}` followed by CRLF and `n` bytes.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let size: usize = std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("Invalid literal size"))?;

        if self.peek() == Some(b'+') {
            self.pos += 1;
        }
        if self.advance() != Some(b'}') {
            return Err(self.error("Expected } after literal size"));
        }
        match (self.peek(), self.peek_at(1)) {
            (Some(b'\r'), Some(b'\n')) => self.pos += 2,
            (Some(b'\n'), _) => self.pos += 1,
            _ => return Err(self.error("Expected CRLF after literal size")),
        }

        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("Incomplete literal data"))?;
        let data = self.input[self.pos..end].to_vec();
        self.pos = end;

        Ok(Token::Literal(data))
    }

    /// Reads an atom; all-digit atoms become numbers and `NIL` becomes
    /// [`Token::Nil`].
    fn read_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.pos += 1;
        }
        let s = self.slice_str(start)?;

        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse()
                .map(Token::Number)
                .map_err(|_| self.error("Number too large"));
        }
        if s.eq_ignore_ascii_case("NIL") {
            return Ok(Token::Nil);
        }
        Ok(Token::Atom(s))
    }

    fn slice_str(&self, start: usize) -> Result<&'a str> {
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))
    }

    /// Creates a parse error at the current position.
    pub(crate) fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads an astring (atom, number, quoted string or literal).
    pub fn read_astring(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s.to_string()),
            Token::Number(n) => Ok(n.to_string()),
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            Token::Nil => Ok("NIL".to_string()),
            token => Err(self.error(&format!("Expected astring, got {token:?}"))),
        }
    }

    /// Reads an nstring (NIL, quoted string or literal) as bytes.
    pub fn read_nstring(&mut self) -> Result<Option<Vec<u8>>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) => Ok(Some(s.into_bytes())),
            Token::Literal(data) => Ok(Some(data)),
            token => Err(self.error(&format!("Expected nstring, got {token:?}"))),
        }
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("Expected number, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("Expected atom, got {token:?}"))),
        }
    }

    /// Skips one value: a token, or a whole parenthesized list.
    pub fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.next_token()? {
                Token::LParen => depth += 1,
                Token::RParen if depth > 0 => depth -= 1,
                Token::RParen | Token::Crlf | Token::Eof => {
                    return Err(self.error("Unexpected end of value"));
                }
                _ => {}
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }
}

/// Returns true if the byte may appear in an atom.
///
/// Backslash is accepted so that flags like `\Seen` lex as one atom.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b, 0x21..=0x7E)
        && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'[' | b']')
}
