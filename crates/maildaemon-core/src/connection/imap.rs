//! IMAP session.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;
use maildaemon_imap::{Flag, Flags, ImapStream, Session, StoreAction, Uid};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{
    Connection, ConnectionSettings, Credentials, FetchMode, FlagChange, FolderInfo, FolderStore,
    MessageId, MessageSource, RawMessage, id_list, timed,
};
use crate::{Error, Result};

/// IMAP connection.
///
/// All message operations address messages by UID. Operations that need a
/// folder open it first; opening the folder that is already selected sends
/// nothing.
pub struct ImapConnection<S = ImapStream> {
    settings: ConnectionSettings,
    credentials: Credentials,
    session: Option<Session<S>>,
}

impl ImapConnection {
    /// Creates a disconnected IMAP connection.
    #[must_use]
    pub const fn new(settings: ConnectionSettings, credentials: Credentials) -> Self {
        Self {
            settings,
            credentials,
            session: None,
        }
    }
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Creates a connection around a session that has read its greeting.
    #[must_use]
    pub const fn with_session(
        settings: ConnectionSettings,
        credentials: Credentials,
        session: Session<S>,
    ) -> Self {
        Self {
            settings,
            credentials,
            session: Some(session),
        }
    }

    /// Name of the folder currently open.
    #[must_use]
    pub fn open_folder_name(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(Session::selected_mailbox)
            .map(|mailbox| mailbox.as_str())
    }

    /// Logs in with LOGIN, or AUTHENTICATE XOAUTH2 when `oauth` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if credentials are missing or refused.
    pub async fn authenticate(&mut self) -> Result<()> {
        let name = self.settings.name.clone();
        let connect_error = |reason: String| Error::Connect {
            connection: name.clone(),
            reason,
        };

        let login = self
            .credentials
            .login(&self.settings)
            .map_err(|e| connect_error(e.to_string()))?;
        let secret = if self.settings.oauth {
            self.credentials.bearer_token(&self.settings)
        } else {
            self.credentials.password(&self.settings)
        }
        .map_err(|e| connect_error(e.to_string()))?;

        let oauth = self.settings.oauth;
        let session = self.session()?;
        let result = if oauth {
            run("authenticate", &login, session.authenticate_xoauth2(&login, &secret)).await
        } else {
            run("login", &login, session.login(&login, &secret)).await
        };
        result.map_err(|e| connect_error(e.to_string()))?;

        tracing::info!(connection = %self.settings.name, user = %login, "Logged in");
        Ok(())
    }

    /// Sends NOOP; any failure reads as dead.
    pub async fn check_alive(&mut self) -> bool {
        let Some(session) = self.session.as_mut().filter(|s| s.is_connected()) else {
            return false;
        };
        match run("noop", "", session.noop()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(connection = %self.settings.name, error = %e, "NOOP failed");
                false
            }
        }
    }

    /// Closes the open folder and logs out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disconnect`] if the server does not acknowledge the
    /// logout. The session is dropped either way.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        let disconnect_error = |e: Error| Error::Disconnect {
            connection: self.settings.name.clone(),
            reason: e.to_string(),
        };

        if session.selected_mailbox().is_some() {
            run("close", "", session.close())
                .await
                .map_err(disconnect_error)?;
        }
        run("logout", "", session.logout())
            .await
            .map_err(disconnect_error)?;

        tracing::info!(connection = %self.settings.name, "Logged out");
        Ok(())
    }

    fn session(&mut self) -> Result<&mut Session<S>> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::Transport(format!("{}: not connected", self.settings.name)))
    }

    async fn ensure_open(&mut self, folder: &str) -> Result<()> {
        if self.open_folder_name() == Some(folder) {
            return Ok(());
        }
        let session = self.session()?;
        let status = run("open", folder, session.select(folder)).await?;
        tracing::debug!(
            connection = %self.settings.name,
            folder,
            exists = status.exists,
            "Folder opened"
        );
        Ok(())
    }
}

#[async_trait]
impl Connection for ImapConnection {
    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let host = self.settings.domain.clone();
        let port = self.settings.port();
        let session = run("connect", &host, Session::connect(&host, port, self.settings.ssl))
            .await
            .map_err(|e| Error::Connect {
                connection: self.settings.name.clone(),
                reason: e.to_string(),
            })?;
        self.session = Some(session);

        if let Err(e) = self.authenticate().await {
            self.session = None;
            return Err(e);
        }
        Ok(())
    }

    async fn is_alive(&mut self) -> bool {
        self.check_alive().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.shutdown().await
    }

    fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_authenticated)
    }

    fn as_source(&mut self) -> Option<&mut dyn MessageSource> {
        Some(self)
    }

    fn as_folder_store(&mut self) -> Option<&mut dyn FolderStore> {
        Some(self)
    }
}

#[async_trait]
impl<S> MessageSource for ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn list_folders(&mut self) -> Result<Vec<FolderInfo>> {
        let session = self.session()?;
        let listing = run("list", "\"\" \"*\"", session.list()).await?;

        Ok(listing
            .into_iter()
            .map(|entry| FolderInfo {
                name: entry.mailbox.as_str().to_string(),
                flags: entry
                    .attributes
                    .iter()
                    .map(|attribute| attribute.as_str().to_string())
                    .collect(),
                delimiter: entry.delimiter,
            })
            .collect())
    }

    async fn open_folder(&mut self, folder: &str) -> Result<()> {
        self.ensure_open(folder).await
    }

    async fn close_folder(&mut self) -> Result<()> {
        let session = self.session()?;
        run("close", "", session.close()).await
    }

    async fn message_ids(&mut self) -> Result<Vec<MessageId>> {
        let session = self.session()?;
        let uids = run("search", "ALL", session.uid_search_all()).await?;
        Ok(uids.into_iter().map(|uid| MessageId(uid.get())).collect())
    }

    async fn fetch(&mut self, ids: &[MessageId], mode: FetchMode) -> Result<Vec<RawMessage>> {
        let items = match mode {
            FetchMode::Headers => maildaemon_imap::FetchItems::headers(),
            FetchMode::Full => maildaemon_imap::FetchItems::full(),
        };
        let uids = to_uids(ids);
        let session = self.session()?;
        let records = run("fetch", id_list(ids), session.uid_fetch(&uids, items)).await?;

        let mut by_uid: HashMap<u32, _> = records
            .into_iter()
            .filter_map(|record| record.uid.map(|uid| (uid.get(), record)))
            .collect();

        let mut messages = Vec::with_capacity(ids.len());
        for &id in ids {
            let Some(record) = by_uid.remove(&id.0) else {
                tracing::warn!(
                    connection = %self.settings.name,
                    uid = id.0,
                    "No FETCH data for UID"
                );
                continue;
            };
            let data = match mode {
                FetchMode::Headers => record.header,
                FetchMode::Full => record.body,
            };
            messages.push(RawMessage {
                id,
                flags: record.flags.as_ref().map(flag_names).unwrap_or_default(),
                internal_date: record.internal_date,
                data: data.unwrap_or_default(),
            });
        }
        Ok(messages)
    }

    async fn fetch_flags(
        &mut self,
        ids: &[MessageId],
    ) -> Result<Vec<(MessageId, BTreeSet<String>)>> {
        let uids = to_uids(ids);
        let session = self.session()?;
        let records = run(
            "fetch",
            id_list(ids),
            session.uid_fetch(&uids, maildaemon_imap::FetchItems::flags()),
        )
        .await?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let uid = record.uid?;
                Some((
                    MessageId(uid.get()),
                    record.flags.as_ref().map(flag_names).unwrap_or_default(),
                ))
            })
            .collect())
    }

    async fn delete(&mut self, folder: &str, id: MessageId) -> Result<()> {
        self.store_flags(folder, &[id], FlagChange::Add(vec!["Deleted".into()]), true)
            .await
    }
}

#[async_trait]
impl<S> FolderStore for ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn store_flags(
        &mut self,
        folder: &str,
        ids: &[MessageId],
        change: FlagChange,
        silent: bool,
    ) -> Result<()> {
        self.ensure_open(folder).await?;
        let args = format!("{folder} {} {change}", id_list(ids));
        let action = match change {
            FlagChange::Add(names) => StoreAction::Add(to_flags(&names)),
            FlagChange::Remove(names) => StoreAction::Remove(to_flags(&names)),
            FlagChange::Replace(names) => StoreAction::Replace(to_flags(&names)),
        };
        let uids = to_uids(ids);
        let session = self.session()?;
        run("store", args, session.uid_store(&uids, action, silent)).await
    }

    async fn copy(&mut self, folder: &str, ids: &[MessageId], target: &str) -> Result<()> {
        let args = format!("{folder} {} {target}", id_list(ids));
        if folder == target {
            return Err(Error::operation(
                "copy",
                args,
                "target folder is the source folder",
            ));
        }
        self.ensure_open(folder).await?;
        let uids = to_uids(ids);
        let session = self.session()?;
        run("copy", args, session.uid_copy(&uids, target)).await
    }

    async fn append(
        &mut self,
        folder: &str,
        message: &[u8],
        flags: &BTreeSet<String>,
        internal_date: Option<&str>,
    ) -> Result<()> {
        // \Recent is server-managed and may not be set by a client
        let flags: Vec<Flag> = flags
            .iter()
            .map(|name| Flag::from_name(name))
            .filter(|flag| *flag != Flag::Recent)
            .collect();
        let session = self.session()?;
        run(
            "append",
            folder,
            session.append(folder, &flags, internal_date, message),
        )
        .await
    }

    async fn expunge(&mut self, folder: &str) -> Result<()> {
        self.ensure_open(folder).await?;
        let session = self.session()?;
        let expunged = run("expunge", folder, session.expunge()).await?;
        tracing::debug!(folder, count = expunged.len(), "Expunged");
        Ok(())
    }
}

/// Awaits an IMAP call under the socket timeout and translates its error.
async fn run<T, F>(op: &str, args: impl Display, future: F) -> Result<T>
where
    F: Future<Output = maildaemon_imap::Result<T>>,
{
    timed(op, future)
        .await?
        .map_err(|error| translate(op, &args, error))
}

fn translate(op: &str, args: &impl Display, error: maildaemon_imap::Error) -> Error {
    use maildaemon_imap::Error as Imap;

    match error {
        Imap::Io(_) | Imap::Tls(_) | Imap::InvalidDnsName(_) => {
            Error::Transport(format!("{op}: {error}"))
        }
        other => Error::operation(op, args, other),
    }
}

fn to_uids(ids: &[MessageId]) -> Vec<Uid> {
    ids.iter().filter_map(|id| Uid::new(id.0)).collect()
}

fn to_flags(names: &[String]) -> Vec<Flag> {
    names.iter().map(|name| Flag::from_name(name)).collect()
}

/// Server flags as the engine stores them, without the leading backslash.
fn flag_names(flags: &Flags) -> BTreeSet<String> {
    flags
        .iter()
        .map(|flag| {
            if let Flag::Keyword(keyword) = flag {
                tracing::debug!(flag = %keyword, "Non-standard flag");
            }
            flag.name().to_string()
        })
        .collect()
}
