//! # maildaemon-pop
//!
//! Async POP3 client (RFC 1939) with STLS (RFC 2595) and APOP.
//!
//! ```ignore
//! use maildaemon_pop::{Client, PopStream};
//!
//! let stream = PopStream::connect("pop.example.com", 995, true).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = match client.apop("me", "secret").await {
//!     Ok(client) => client,
//!     Err(rejected) => rejected.client.login("me", "secret").await?,
//! };
//! ```
//!
//! A POP3 mail drop is a single folder. Messages are addressed by their
//! number in the current session; deletions take effect at QUIT.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
pub mod command;
mod error;
pub mod response;
mod stream;

pub use client::{AuthResult, Authorization, Client, Transaction};
pub use command::Command;
pub use error::{Error, Rejected, Result};
pub use stream::PopStream;
