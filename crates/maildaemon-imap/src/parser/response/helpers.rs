//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, ResponseCode, Uid,
    UidValidity,
};
use crate::{Error, Result};

/// Parses a bracketed response code.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let code = match atom.to_ascii_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidNext(Uid::new(n).ok_or_else(|| lexer.error("UIDNEXT 0"))?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidValidity(
                UidValidity::new(n).ok_or_else(|| lexer.error("UIDVALIDITY 0"))?,
            )
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            ResponseCode::Unseen(lexer.read_number()?)
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?.into_iter().collect())
        }
        _ => ResponseCode::Unknown(atom.to_string()),
    };

    // Codes carry arguments this client does not interpret; skip to the bracket.
    while lexer.peek().is_some_and(|b| b != b']' && b != b'\r') {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

/// Parses space-separated capability atoms.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(Capability::parse(s)),
            Token::Number(n) => caps.push(Capability::Unknown(n.to_string())),
            _ => break,
        }
    }

    Ok(caps)
}

/// Parses a parenthesized flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;

    let mut flags = Flags::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            token => {
                return Err(lexer.error(&format!("Unexpected token in flag list: {token:?}")));
            }
        }
    }

    Ok(flags)
}

/// Parses the data of a LIST response.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(s) => attributes.push(MailboxAttribute::parse(s)),
            token => {
                return Err(lexer.error(&format!("Unexpected token in LIST attributes: {token:?}")));
            }
        }
    }
    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(lexer.error(&format!("Expected delimiter, got {token:?}"))),
    };
    lexer.expect_space()?;

    let name = lexer.read_astring()?;

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox: Mailbox::from_wire(&name),
    })
}

/// Parses the numbers of a SEARCH response.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        match lexer.next_token()? {
            Token::Number(n) => nums.push(n),
            // MODSEQ suffix or trailing junk
            _ => break,
        }
    }

    Ok(nums)
}

/// Reads text up to CRLF and consumes the CRLF.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let remaining = lexer.remaining();
    let end = remaining
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(remaining.len());
    let text = String::from_utf8_lossy(&remaining[..end]).into_owned();

    lexer.skip(end);
    if lexer.peek() == Some(b'\r') {
        lexer.advance();
    }
    if lexer.peek() == Some(b'\n') {
        lexer.advance();
    }

    text
}
