//! # maildaemon-mime
//!
//! MIME entity parsing for messages fetched by maildaemon.
//!
//! ## Features
//!
//! - **Entity tree**: Recursive parsing of RFC 5322 messages and RFC 2046
//!   multipart bodies into [`Entity`] values
//! - **Headers**: Ordered, case-insensitive header access with folding support
//! - **Decoding**: Base64, Quoted-Printable and RFC 2047 encoded words
//! - **Charsets**: Any WHATWG-registered charset through `encoding_rs`
//!
//! ## Quick Start
//!
//! ```
//! use maildaemon_mime::{Body, Entity};
//!
//! let raw = b"Subject: Hi\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nHello!";
//! let entity = Entity::parse(raw).unwrap();
//!
//! assert_eq!(entity.headers.get("subject"), Some("Hi"));
//! assert!(matches!(entity.body, Body::Leaf(_)));
//! assert_eq!(entity.decode_text().unwrap(), "Hello!");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod entity;
mod error;
mod header;

pub mod encoding;

pub use content_type::ContentType;
pub use entity::{Body, Entity, TransferEncoding};
pub use error::{Error, Result};
pub use header::Headers;
