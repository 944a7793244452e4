//! Remote mail sessions behind one interface.
//!
//! Every session implements [`Connection`]. What it can do beyond that is
//! exposed through narrower capability traits: [`MessageSource`] for
//! reading folders and messages, [`FolderStore`] for changing them and
//! [`MessageSender`] for submission. POP is only a source, SMTP only a
//! sender, IMAP is both a source and a store.

pub mod credentials;
mod group;
mod imap;
mod pop;
mod settings;
mod smtp;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

pub use credentials::{CredentialProvider, Credentials, StaticCredentials, TokenProvider};
pub use group::ConnectionGroup;
pub use imap::ImapConnection;
pub use pop::PopConnection;
pub use settings::{ConnectionSettings, Protocol};
pub use smtp::SmtpConnection;

use crate::message::Message;
use crate::{Error, Result};

/// Limit applied to every network operation.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

/// Server-side message identifier: an IMAP UID or a POP message number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u32);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A folder as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    /// Full folder name.
    pub name: String,
    /// Folder flags, e.g. `\Noselect`.
    pub flags: BTreeSet<String>,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
}

impl FolderInfo {
    /// Creates a folder entry without flags.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: BTreeSet::new(),
            delimiter: None,
        }
    }
}

/// How much of each message to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// The header block only.
    Headers,
    /// The complete message.
    Full,
}

/// One fetched message before MIME parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Server-side identifier.
    pub id: MessageId,
    /// Flags without the leading backslash.
    pub flags: BTreeSet<String>,
    /// Server arrival time, verbatim.
    pub internal_date: Option<String>,
    /// Header block or complete message.
    pub data: Vec<u8>,
}

/// Flag mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagChange {
    /// Add flags.
    Add(Vec<String>),
    /// Remove flags.
    Remove(Vec<String>),
    /// Replace the whole flag set.
    Replace(Vec<String>),
}

impl std::fmt::Display for FlagChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (sign, flags) = match self {
            Self::Add(flags) => ("+", flags),
            Self::Remove(flags) => ("-", flags),
            Self::Replace(flags) => ("", flags),
        };
        write!(f, "{sign}({})", flags.join(" "))
    }
}

/// Server verdict on one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryStatus {
    /// Reply code.
    pub code: u16,
    /// Reply text.
    pub message: String,
}

/// A session with a mail server.
#[async_trait]
pub trait Connection: Send {
    /// Addressing of this connection.
    fn settings(&self) -> &ConnectionSettings;

    /// Name of this connection in the configuration.
    fn name(&self) -> &str {
        &self.settings().name
    }

    /// Establishes and authenticates the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] on transport or authentication failure.
    async fn connect(&mut self) -> Result<()>;

    /// Checks the session. Never fails; any error reads as dead.
    async fn is_alive(&mut self) -> bool;

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disconnect`] if the server does not acknowledge it.
    async fn disconnect(&mut self) -> Result<()>;

    /// Returns true between a successful connect and disconnect.
    fn is_connected(&self) -> bool;

    /// Folder and message reading, if supported.
    fn as_source(&mut self) -> Option<&mut dyn MessageSource> {
        None
    }

    /// Folder and message mutation, if supported.
    fn as_folder_store(&mut self) -> Option<&mut dyn FolderStore> {
        None
    }

    /// Message submission, if supported.
    fn as_sender(&mut self) -> Option<&mut dyn MessageSender> {
        None
    }
}

/// Reading side of a mailbox.
#[async_trait]
pub trait MessageSource: Send {
    /// How much of a message the cache should fetch when scanning.
    fn scan_mode(&self) -> FetchMode {
        FetchMode::Headers
    }

    /// Lists every folder with its flags.
    async fn list_folders(&mut self) -> Result<Vec<FolderInfo>>;

    /// Opens a folder. Opening the folder that is already open is a no-op.
    async fn open_folder(&mut self, folder: &str) -> Result<()>;

    /// Closes the open folder, if any.
    async fn close_folder(&mut self) -> Result<()>;

    /// Lists the message identifiers of the open folder.
    async fn message_ids(&mut self) -> Result<Vec<MessageId>>;

    /// Fetches messages of the open folder, one record per identifier
    /// found, in request order.
    async fn fetch(&mut self, ids: &[MessageId], mode: FetchMode) -> Result<Vec<RawMessage>>;

    /// Fetches the current flags of messages in the open folder.
    async fn fetch_flags(&mut self, ids: &[MessageId])
    -> Result<Vec<(MessageId, BTreeSet<String>)>>;

    /// Marks a message for deletion.
    async fn delete(&mut self, folder: &str, id: MessageId) -> Result<()>;
}

/// Mutating side of a mailbox.
#[async_trait]
pub trait FolderStore: Send {
    /// Changes flags of messages in `folder`.
    async fn store_flags(
        &mut self,
        folder: &str,
        ids: &[MessageId],
        change: FlagChange,
        silent: bool,
    ) -> Result<()>;

    /// Copies messages from `folder` into `target`.
    async fn copy(&mut self, folder: &str, ids: &[MessageId], target: &str) -> Result<()>;

    /// Appends a complete message to `folder`.
    async fn append(
        &mut self,
        folder: &str,
        message: &[u8],
        flags: &BTreeSet<String>,
        internal_date: Option<&str>,
    ) -> Result<()>;

    /// Removes messages flagged `Deleted` from `folder`.
    async fn expunge(&mut self, folder: &str) -> Result<()>;
}

/// Message submission.
#[async_trait]
pub trait MessageSender: Send {
    /// Sends a message to every `To` recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if any recipient is refused; the
    /// transaction is then aborted for all of them.
    async fn send(&mut self, message: &Message) -> Result<BTreeMap<String, DeliveryStatus>>;

    /// Adds a message to the outbox.
    fn queue(&mut self, message: Message);

    /// Messages waiting to be sent.
    fn outbox(&self) -> &[Message];

    /// Sends queued messages in order, stopping at the first failure.
    ///
    /// Returns the number of messages sent; unsent ones stay queued.
    async fn flush_outbox(&mut self) -> Result<usize>;
}

/// Runs `future` under [`SOCKET_TIMEOUT`].
pub(crate) async fn timed<F: Future>(op: &str, future: F) -> Result<F::Output> {
    tokio::time::timeout(SOCKET_TIMEOUT, future)
        .await
        .map_err(|_| {
            Error::Transport(format!(
                "{op} timed out after {}s",
                SOCKET_TIMEOUT.as_secs()
            ))
        })
}

/// Joins message identifiers for logs and error arguments.
pub(crate) fn id_list(ids: &[MessageId]) -> String {
    ids.iter()
        .map(|id| id.0.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
