//! Runtime-state IMAP session.
//!
//! `Session` wraps the type-state [`Client`] for callers that keep one
//! long-lived connection in a struct field and cannot thread ownership
//! through every state transition. Commands issued in the wrong state fail
//! with [`Error::InvalidState`]; refused transitions leave the session in
//! the state the server left it in.
//!
//! ```ignore
//! use maildaemon_imap::{Session, StoreAction, Flag};
//!
//! let mut session = Session::connect("imap.example.com", 993, true).await?;
//! session.login("user@example.com", "password").await?;
//! session.select("INBOX").await?;
//! let uids = session.uid_search_all().await?;
//! session.uid_store(&uids, StoreAction::Add(vec![Flag::Seen]), true).await?;
//! session.logout().await?;
//! ```

#![allow(clippy::missing_errors_doc)]

use tokio::io::{AsyncRead, AsyncWrite};

use super::ImapStream;
use super::client::{Authenticated, Client, NotAuthenticated, Selected};
use crate::command::{FetchItems, SearchCriteria, StoreAction};
use crate::fetch::FetchedMessage;
use crate::types::{Flag, ListResponse, Mailbox, MailboxStatus, Uid, UidSet};
use crate::{Error, Rejected, Result};

enum SessionState<S> {
    Disconnected,
    Connected(Client<S, NotAuthenticated>),
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
}

/// IMAP session with its protocol state tracked at runtime.
pub struct Session<S = ImapStream> {
    state: SessionState<S>,
}

impl Session<ImapStream> {
    /// Connects to a server and reads its greeting.
    pub async fn connect(host: &str, port: u16, tls: bool) -> Result<Self> {
        let stream = ImapStream::connect(host, port, tls).await?;
        Self::from_stream(stream).await
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a session on an already connected stream.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let client = Client::from_stream(stream).await?;
        Ok(Self {
            state: SessionState::Connected(client),
        })
    }

    /// Returns true until the session logged out or lost its connection.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        !matches!(self.state, SessionState::Disconnected)
    }

    /// Returns true once LOGIN or AUTHENTICATE succeeded.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(
            self.state,
            SessionState::Authenticated(_) | SessionState::Selected(_)
        )
    }

    /// Returns the selected mailbox, if any.
    #[must_use]
    pub const fn selected_mailbox(&self) -> Option<&Mailbox> {
        match &self.state {
            SessionState::Selected(client) => Some(client.mailbox()),
            _ => None,
        }
    }

    /// Logs in with a username and password.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let client = self.take_connected()?;
        self.finish_auth(client.login(username, password).await)
    }

    /// Authenticates with XOAUTH2.
    pub async fn authenticate_xoauth2(&mut self, user: &str, token: &str) -> Result<()> {
        let client = self.take_connected()?;
        self.finish_auth(client.authenticate_xoauth2(user, token).await)
    }

    /// Lists every mailbox (`LIST "" "*"`).
    pub async fn list(&mut self) -> Result<Vec<ListResponse>> {
        match &mut self.state {
            SessionState::Authenticated(client) => client.list("", "*").await,
            SessionState::Selected(client) => client.list("", "*").await,
            _ => Err(not_authenticated()),
        }
    }

    /// Selects a mailbox, replacing any current selection.
    pub async fn select(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        let mailbox = Mailbox::new(mailbox);
        let result = match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Authenticated(client) => client.select(&mailbox).await,
            SessionState::Selected(client) => client.select(&mailbox).await,
            other => {
                self.state = other;
                return Err(not_authenticated());
            }
        };

        match result {
            Ok(selected) => {
                let status = selected.status().clone();
                self.state = SessionState::Selected(selected);
                Ok(status)
            }
            Err(Rejected { client, error }) => {
                self.state = SessionState::Authenticated(client);
                Err(error)
            }
        }
    }

    /// Closes the selected mailbox. Does nothing if none is selected.
    pub async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Selected(client) => match client.close().await {
                Ok(authenticated) => {
                    self.state = SessionState::Authenticated(authenticated);
                    Ok(())
                }
                Err(Rejected { client, error }) => {
                    self.state = SessionState::Selected(client);
                    Err(error)
                }
            },
            other => {
                self.state = other;
                Ok(())
            }
        }
    }

    /// Returns the UIDs of every message in the selected mailbox.
    pub async fn uid_search_all(&mut self) -> Result<Vec<Uid>> {
        self.selected()?.uid_search(SearchCriteria::All).await
    }

    /// Fetches the given UIDs. An empty list issues no command.
    pub async fn uid_fetch(
        &mut self,
        uids: &[Uid],
        items: FetchItems,
    ) -> Result<Vec<FetchedMessage>> {
        let client = self.selected()?;
        match UidSet::from_uids(uids.iter().copied()) {
            Some(set) => client.uid_fetch(&set, items).await,
            None => Ok(Vec::new()),
        }
    }

    /// Changes flags on the given UIDs. An empty list issues no command.
    pub async fn uid_store(
        &mut self,
        uids: &[Uid],
        action: StoreAction,
        silent: bool,
    ) -> Result<()> {
        let client = self.selected()?;
        match UidSet::from_uids(uids.iter().copied()) {
            Some(set) => client.uid_store(&set, action, silent).await,
            None => Ok(()),
        }
    }

    /// Copies the given UIDs to another mailbox.
    pub async fn uid_copy(&mut self, uids: &[Uid], mailbox: &str) -> Result<()> {
        let client = self.selected()?;
        match UidSet::from_uids(uids.iter().copied()) {
            Some(set) => client.uid_copy(&set, &Mailbox::new(mailbox)).await,
            None => Ok(()),
        }
    }

    /// Expunges the selected mailbox.
    pub async fn expunge(&mut self) -> Result<Vec<u32>> {
        self.selected()?.expunge().await
    }

    /// Appends a message to a mailbox.
    pub async fn append(
        &mut self,
        mailbox: &str,
        flags: &[Flag],
        date: Option<&str>,
        message: &[u8],
    ) -> Result<()> {
        let mailbox = Mailbox::new(mailbox);
        match &mut self.state {
            SessionState::Authenticated(client) => {
                client.append(&mailbox, flags, date, message).await
            }
            SessionState::Selected(client) => client.append(&mailbox, flags, date, message).await,
            _ => Err(not_authenticated()),
        }
    }

    /// Sends NOOP.
    pub async fn noop(&mut self) -> Result<()> {
        match &mut self.state {
            SessionState::Connected(client) => client.noop().await,
            SessionState::Authenticated(client) => client.noop().await,
            SessionState::Selected(client) => client.noop().await,
            SessionState::Disconnected => Err(Error::InvalidState("not connected".into())),
        }
    }

    /// Logs out. The session is disconnected afterwards even if the server
    /// did not acknowledge the logout.
    pub async fn logout(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Connected(client) => client.logout().await,
            SessionState::Authenticated(client) => client.logout().await,
            SessionState::Selected(client) => client.logout().await,
            SessionState::Disconnected => Ok(()),
        }
    }

    fn take_connected(&mut self) -> Result<Client<S, NotAuthenticated>> {
        match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Connected(client) => Ok(client),
            other => {
                self.state = other;
                Err(Error::InvalidState("not awaiting authentication".into()))
            }
        }
    }

    fn finish_auth(
        &mut self,
        result: std::result::Result<
            Client<S, Authenticated>,
            Rejected<Client<S, NotAuthenticated>>,
        >,
    ) -> Result<()> {
        match result {
            Ok(client) => {
                self.state = SessionState::Authenticated(client);
                Ok(())
            }
            Err(Rejected { client, error }) => {
                self.state = SessionState::Connected(client);
                Err(error)
            }
        }
    }

    fn selected(&mut self) -> Result<&mut Client<S, Selected>> {
        match &mut self.state {
            SessionState::Selected(client) => Ok(client),
            _ => Err(Error::InvalidState("not in selected state".into())),
        }
    }
}

fn not_authenticated() -> Error {
    Error::InvalidState("not authenticated".into())
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected(_) => "connected",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Selected(_) => "selected",
        };
        f.debug_struct("Session")
            .field("state", &state)
            .finish_non_exhaustive()
    }
}
