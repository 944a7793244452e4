//! # maildaemon-core
//!
//! Engine of the `maildaemon` mail-processing daemon.
//!
//! This crate provides:
//! - **Connections** - IMAP, POP and SMTP sessions behind one [`Connection`]
//!   trait, with narrower capability traits for reading, changing and
//!   sending mail
//! - **Messages** - normalized messages built from the raw MIME tree
//! - **Caches** - per-connection mirrors reconciled against the server by
//!   polling
//! - **Filters** - compiled conditions and vetted actions
//! - **Daemon group** - the polling loop tying it all together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use maildaemon_core::{Config, DaemonGroup, StaticCredentials};
//!
//! # async fn example() -> maildaemon_core::Result<()> {
//! let config = Config::load(".maildaemon.json")?;
//! let connections = config.connection_group(Arc::new(StaticCredentials), None)?;
//! let filters = config.message_filters(&connections)?;
//!
//! let mut daemon = DaemonGroup::new(connections, filters);
//! daemon.run(Some(3), maildaemon_core::DEFAULT_INTERVAL).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod connection;
mod daemon;
mod error;
pub mod filter;
pub mod message;

pub use cache::{CacheState, EmailCache, Folder};
pub use config::{Config, ConnectionConfig, FilterConfig};
pub use connection::{
    Connection, ConnectionGroup, ConnectionSettings, CredentialProvider, Credentials,
    DeliveryStatus, FetchMode, FlagChange, FolderInfo, FolderStore, ImapConnection, MessageId,
    MessageSender, MessageSource, PopConnection, Protocol, RawMessage, SmtpConnection,
    StaticCredentials, TokenProvider,
};
pub use daemon::{DEFAULT_INTERVAL, DaemonGroup, run_daemon_group};
pub use error::{Error, Result};
pub use filter::{Action, Condition, MessageFilter, Operator};
pub use message::{Attachment, EmailAddress, Message, Origin};
