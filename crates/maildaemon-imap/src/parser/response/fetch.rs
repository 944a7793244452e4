//! FETCH response parsing.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;

use super::helpers::parse_flag_list;
use super::types::FetchItem;

/// Parses the parenthesized data of a FETCH response.
///
/// Items this client never requests (ENVELOPE, BODYSTRUCTURE, MODSEQ...)
/// are skipped.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => continue,
            Token::Atom(name) => name,
            token => return Err(lexer.error(&format!("Expected fetch item, got {token:?}"))),
        };

        match name.to_ascii_uppercase().as_str() {
            "FLAGS" => {
                lexer.expect_space()?;
                items.push(FetchItem::Flags(parse_flag_list(lexer)?));
            }
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| lexer.error("UID cannot be 0"))?;
                items.push(FetchItem::Uid(uid));
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Rfc822Size(lexer.read_number()?));
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                if let Token::QuotedString(date) = lexer.next_token()? {
                    items.push(FetchItem::InternalDate(date));
                }
            }
            upper @ ("BODY" | "BINARY" | "RFC822" | "RFC822.HEADER" | "RFC822.TEXT") => {
                let (mut section, origin) = parse_section_and_origin(lexer);
                if section.is_none() && upper == "RFC822.HEADER" {
                    section = Some("HEADER".to_string());
                } else if section.is_none() && upper == "RFC822.TEXT" {
                    section = Some("TEXT".to_string());
                }

                lexer.expect_space()?;
                // BODY without a section is a BODYSTRUCTURE-like list
                if section.is_none() && upper == "BODY" && lexer.peek() == Some(b'(') {
                    lexer.skip_value()?;
                    continue;
                }
                let data = lexer.read_nstring()?;
                items.push(FetchItem::Body {
                    section,
                    origin,
                    data,
                });
            }
            _ => {
                lexer.expect_space()?;
                lexer.skip_value()?;
            }
        }
    }

    Ok(items)
}

/// Parses an optional `[section]` and `<origin>` after BODY.
///
/// The section is read raw since it may contain spaces and parentheses
/// (`HEADER.FIELDS (SUBJECT)`).
fn parse_section_and_origin(lexer: &mut Lexer<'_>) -> (Option<String>, Option<u32>) {
    let mut section = None;
    let mut origin = None;

    if lexer.peek() == Some(b'[') {
        lexer.advance();
        let mut buf = String::new();
        while let Some(b) = lexer.advance() {
            if b == b']' {
                break;
            }
            buf.push(char::from(b));
        }
        if !buf.is_empty() {
            section = Some(buf);
        }
    }

    if lexer.peek() == Some(b'<') {
        lexer.advance();
        let mut buf = String::new();
        while let Some(b) = lexer.advance() {
            if b == b'>' {
                break;
            }
            buf.push(char::from(b));
        }
        origin = buf.parse().ok();
    }

    (section, origin)
}
