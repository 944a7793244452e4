//! IMAP token types.

/// Token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom, including backslash flags such as `\Seen` and `\*`.
    Atom(&'a str),
    /// Quoted string, unescaped.
    QuotedString(String),
    /// Literal payload of a `{n}` string.
    Literal(Vec<u8>),
    /// Number.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single space.
    Space,
    /// `*` (untagged response prefix).
    Asterisk,
    /// `+` (continuation request prefix).
    Plus,
    /// NIL.
    Nil,
    /// CRLF line ending.
    Crlf,
    /// End of input.
    Eof,
}
