//! # maildaemon-imap
//!
//! Async IMAP4rev1 client for scanning and filing messages.
//!
//! The client covers what a filtering daemon needs: LOGIN or XOAUTH2
//! authentication, LIST, SELECT, and the UID forms of SEARCH, FETCH, STORE
//! and COPY, plus EXPUNGE and APPEND. Messages are always addressed by UID.
//!
//! ## Quick Start
//!
//! ```ignore
//! use maildaemon_imap::{Client, FetchItems, ImapStream, Mailbox, SearchCriteria, UidSet};
//!
//! #[tokio::main]
//! async fn main() -> maildaemon_imap::Result<()> {
//!     let stream = ImapStream::connect("imap.example.com", 993, true).await?;
//!     let client = Client::from_stream(stream).await?;
//!
//!     let client = client
//!         .login("user@example.com", "password")
//!         .await
//!         .map_err(|rejected| rejected.error)?;
//!     let mut client = client
//!         .select(&Mailbox::new("INBOX"))
//!         .await
//!         .map_err(|rejected| rejected.error)?;
//!
//!     let uids = client.uid_search(SearchCriteria::Unseen).await?;
//!     if let Some(set) = UidSet::from_uids(uids) {
//!         for message in client.uid_fetch(&set, FetchItems::headers()).await? {
//!             println!("{:?} {:?}", message.uid, message.size);
//!         }
//!     }
//!
//!     client.logout().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌─────────────────────┐
//! │   NotAuthenticated  │ ─── login() ───→ Authenticated
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    Authenticated    │ ─── select() ───→ Selected
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │      Selected       │ ─── close() ───→ Authenticated
//! └─────────────────────┘
//! ```
//!
//! [`Session`] tracks the same states at runtime for callers that keep a
//! connection in a long-lived struct.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod auth;
pub mod command;
pub mod connection;
mod error;
pub mod fetch;
pub mod parser;
pub mod types;

pub use auth::xoauth2_response;
pub use command::{Command, FetchAttribute, FetchItems, SearchCriteria, StoreAction, TagGenerator};
pub use connection::{
    AuthResult, Authenticated, Client, FramedStream, ImapStream, NotAuthenticated, Selected,
    Session,
};
pub use error::{Error, Rejected, Result};
pub use fetch::FetchedMessage;
pub use parser::{Response, ResponseParser, UntaggedResponse};
pub use types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, ResponseCode,
    Status, Tag, Uid, UidSet, UidValidity,
};
