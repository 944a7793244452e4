//! Sans-I/O parser for IMAP server responses.
//!
//! The [`lexer`] turns one framed response into tokens; [`response`] builds
//! structured values from them.
//!
//! # Example
//!
//! ```
//! use maildaemon_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 3 EXISTS\r\n").unwrap();
//! assert!(matches!(response, Response::Untagged(UntaggedResponse::Exists(3))));
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{FetchItem, Response, ResponseParser, UntaggedResponse};
