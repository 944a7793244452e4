//! IMAP response parser.

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{FetchItem, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, Status, Tag};
use crate::{Error, Result};

use helpers::{
    parse_capability_data, parse_flag_list, parse_list_response, parse_response_code,
    parse_search_response, read_text_until_crlf,
};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// The command tag.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Text or base64 challenge, if any.
        text: Option<String>,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one complete response as framed by
    /// [`FramedStream`](crate::FramedStream).
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => {
                if lexer.peek() == Some(b' ') {
                    lexer.advance();
                }
                let text = read_text_until_crlf(&mut lexer);
                Ok(Response::Continuation {
                    text: (!text.is_empty()).then_some(text),
                })
            }
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            token => Err(Error::Parse {
                position: 0,
                message: format!("Expected *, + or tag, got {token:?}"),
            }),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let status = Self::parse_status(lexer)?;
        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(keyword) => match keyword.to_ascii_uppercase().as_str() {
                "OK" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Ok { code, text }
                }
                "NO" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::No { code, text }
                }
                "BAD" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Bad { code, text }
                }
                "PREAUTH" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::PreAuth { code, text }
                }
                "BYE" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Bye { code, text }
                }
                "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
                "FLAGS" => {
                    lexer.expect_space()?;
                    UntaggedResponse::Flags(parse_flag_list(lexer)?)
                }
                "LIST" | "LSUB" => {
                    lexer.expect_space()?;
                    UntaggedResponse::List(parse_list_response(lexer)?)
                }
                "SEARCH" => UntaggedResponse::Search(parse_search_response(lexer)?),
                _ => {
                    return Err(lexer.error(&format!("Unknown untagged response: {keyword}")));
                }
            },
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?;
                match keyword.to_ascii_uppercase().as_str() {
                    "EXISTS" => UntaggedResponse::Exists(n),
                    "RECENT" => UntaggedResponse::Recent(n),
                    "EXPUNGE" => UntaggedResponse::Expunge(n),
                    "FETCH" => {
                        lexer.expect_space()?;
                        UntaggedResponse::Fetch {
                            seq: n,
                            items: fetch::parse_fetch_response(lexer)?,
                        }
                    }
                    _ => return Err(lexer.error(&format!("Unknown message data: {keyword}"))),
                }
            }
            token => {
                return Err(lexer.error(&format!(
                    "Unexpected token in untagged response: {token:?}"
                )));
            }
        };

        Ok(Response::Untagged(untagged))
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let s = lexer.read_atom_string()?;
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            "PREAUTH" => Ok(Status::PreAuth),
            "BYE" => Ok(Status::Bye),
            _ => Err(lexer.error(&format!("Invalid status: {s}"))),
        }
    }

    /// Parses `[code] text` after a status word. Both parts are optional.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        Ok((code, read_text_until_crlf(lexer)))
    }
}
