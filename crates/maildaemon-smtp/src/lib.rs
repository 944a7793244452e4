//! # maildaemon-smtp
//!
//! SMTP submission client (RFC 5321) used by maildaemon to send mail.
//!
//! - Implicit TLS or STARTTLS upgrade
//! - AUTH PLAIN, LOGIN and XOAUTH2
//! - One transaction per message with a reply per recipient; a refused
//!   recipient resets the transaction instead of sending to the rest
//!
//! ## Quick Start
//!
//! ```ignore
//! use maildaemon_smtp::{Address, Client, SmtpStream};
//!
//! #[tokio::main]
//! async fn main() -> maildaemon_smtp::Result<()> {
//!     let stream = SmtpStream::connect("smtp.example.com", 587, false).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client.ehlo("client.example.com").await?;
//!     let client = client.starttls("smtp.example.com", "client.example.com").await?;
//!     let mut client = client.auth_plain("user@example.com", "password").await?;
//!
//!     let from = Address::new("sender@example.com")?;
//!     let to = Address::new("recipient@example.com")?;
//!     let status = client
//!         .send_mail(&from, &[to], b"Subject: Test\r\n\r\nHello, World!\r\n")
//!         .await?;
//!     println!("{status:?}");
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── auth_plain() / auth_login() / auth_xoauth2() ───→ Authenticated
//! └──────────────┘
//! ```
//!
//! `send_mail`, `noop` and `quit` are available in both states.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Authenticated, Client, Connected, ServerInfo, SmtpStream};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
