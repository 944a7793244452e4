//! POP session.
//!
//! POP has a single folder, `INBOX`, no flags and no header-only fetch.
//! Message ids are the message numbers of LIST; deletions are applied by
//! the server at QUIT.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;
use maildaemon_pop::{Authorization, Client, PopStream, Rejected, Transaction};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{
    Connection, ConnectionSettings, Credentials, FetchMode, FolderInfo, MessageId, MessageSource,
    RawMessage, id_list, timed,
};
use crate::{Error, Result};

const INBOX: &str = "INBOX";

/// POP3 connection.
pub struct PopConnection<S = PopStream> {
    settings: ConnectionSettings,
    credentials: Credentials,
    client: Option<Client<S, Transaction>>,
}

impl PopConnection {
    /// Creates a disconnected POP connection.
    #[must_use]
    pub const fn new(settings: ConnectionSettings, credentials: Credentials) -> Self {
        Self {
            settings,
            credentials,
            client: None,
        }
    }

    /// Upgrades a plaintext session with STLS. A refused STLS keeps the
    /// plaintext session; a failed handshake loses the connection.
    async fn upgrade(
        &self,
        mut client: Client<PopStream, Authorization>,
    ) -> Result<Client<PopStream, Authorization>> {
        if client.is_tls() {
            return Ok(client);
        }
        match run("stls", "", client.stls()).await {
            Ok(()) => {
                let client = run(
                    "stls",
                    &self.settings.domain,
                    client.upgrade_to_tls(&self.settings.domain),
                )
                .await?;
                tracing::info!(connection = %self.settings.name, "Connection upgraded to TLS");
                Ok(client)
            }
            Err(e) => {
                tracing::warn!(
                    connection = %self.settings.name,
                    error = %e,
                    "STLS refused, continuing in plaintext"
                );
                Ok(client)
            }
        }
    }
}

impl<S> PopConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Logs in on a session in the AUTHORIZATION state: APOP when the
    /// greeting offers it, USER/PASS otherwise or when APOP is refused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if credentials are missing or refused.
    pub async fn authenticate(&mut self, client: Client<S, Authorization>) -> Result<()> {
        let name = self.settings.name.clone();
        let connect_error = |reason: String| Error::Connect {
            connection: name.clone(),
            reason,
        };

        let (user, pass) = self
            .credentials
            .resolve(&self.settings)
            .map_err(|e| connect_error(e.to_string()))?;

        let client = if client.apop_timestamp().is_some() {
            match timed("apop", client.apop(&user, &pass))
                .await
                .map_err(|e| connect_error(e.to_string()))?
            {
                Ok(logged_in) => {
                    self.client = Some(logged_in);
                    tracing::info!(connection = %name, user = %user, "Logged in with APOP");
                    return Ok(());
                }
                Err(Rejected { client, error }) => {
                    tracing::warn!(
                        connection = %name,
                        error = %error,
                        "APOP failed, trying USER/PASS"
                    );
                    client
                }
            }
        } else {
            client
        };

        match timed("login", client.login(&user, &pass))
            .await
            .map_err(|e| connect_error(e.to_string()))?
        {
            Ok(logged_in) => {
                self.client = Some(logged_in);
                tracing::info!(connection = %name, user = %user, "Logged in");
                Ok(())
            }
            Err(Rejected { error, .. }) => Err(connect_error(error.to_string())),
        }
    }

    /// Sends NOOP; any failure reads as dead.
    pub async fn check_alive(&mut self) -> bool {
        let Some(client) = self.client.as_mut() else {
            return false;
        };
        match run("noop", "", client.noop()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(connection = %self.settings.name, error = %e, "NOOP failed");
                false
            }
        }
    }

    /// Sends QUIT, which commits pending deletions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disconnect`] if the server does not acknowledge it.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        run("quit", "", client.quit())
            .await
            .map_err(|e| Error::Disconnect {
                connection: self.settings.name.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(connection = %self.settings.name, "Session closed");
        Ok(())
    }

    fn client(&mut self) -> Result<&mut Client<S, Transaction>> {
        self.client
            .as_mut()
            .ok_or_else(|| Error::Transport(format!("{}: not connected", self.settings.name)))
    }
}

#[async_trait]
impl Connection for PopConnection {
    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn connect(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }
        let connect_error = |e: Error| Error::Connect {
            connection: self.settings.name.clone(),
            reason: e.to_string(),
        };

        let host = &self.settings.domain;
        let stream = run(
            "connect",
            host,
            PopStream::connect(host, self.settings.port(), self.settings.ssl),
        )
        .await
        .map_err(connect_error)?;
        let client = run("connect", host, Client::from_stream(stream))
            .await
            .map_err(connect_error)?;
        let client = self.upgrade(client).await.map_err(connect_error)?;

        self.authenticate(client).await
    }

    async fn is_alive(&mut self) -> bool {
        self.check_alive().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.shutdown().await
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn as_source(&mut self) -> Option<&mut dyn MessageSource> {
        Some(self)
    }
}

#[async_trait]
impl<S> MessageSource for PopConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn scan_mode(&self) -> FetchMode {
        FetchMode::Full
    }

    async fn list_folders(&mut self) -> Result<Vec<FolderInfo>> {
        Ok(vec![FolderInfo::new(INBOX)])
    }

    async fn open_folder(&mut self, folder: &str) -> Result<()> {
        require_inbox("open", folder)
    }

    async fn close_folder(&mut self) -> Result<()> {
        Ok(())
    }

    async fn message_ids(&mut self) -> Result<Vec<MessageId>> {
        let client = self.client()?;
        let listing = run("list", "", client.list()).await?;
        Ok(listing.into_iter().map(|(n, _)| MessageId(n)).collect())
    }

    async fn fetch(&mut self, ids: &[MessageId], _mode: FetchMode) -> Result<Vec<RawMessage>> {
        let client = self.client()?;
        let mut messages = Vec::with_capacity(ids.len());
        for &id in ids {
            let data = run("retr", id, client.retr(id.0)).await?;
            messages.push(RawMessage {
                id,
                flags: BTreeSet::new(),
                internal_date: None,
                data,
            });
        }
        tracing::debug!(count = messages.len(), ids = %id_list(ids), "Retrieved");
        Ok(messages)
    }

    async fn fetch_flags(
        &mut self,
        ids: &[MessageId],
    ) -> Result<Vec<(MessageId, BTreeSet<String>)>> {
        Ok(ids.iter().map(|&id| (id, BTreeSet::new())).collect())
    }

    async fn delete(&mut self, folder: &str, id: MessageId) -> Result<()> {
        require_inbox("delete", folder)?;
        let client = self.client()?;
        run("dele", id, client.dele(id.0)).await
    }
}

fn require_inbox(op: &str, folder: &str) -> Result<()> {
    if folder == INBOX {
        Ok(())
    } else {
        Err(Error::operation(op, folder, "POP has no folder but INBOX"))
    }
}

/// Awaits a POP call under the socket timeout and translates its error.
async fn run<T, F>(op: &str, args: impl Display, future: F) -> Result<T>
where
    F: Future<Output = maildaemon_pop::Result<T>>,
{
    timed(op, future)
        .await?
        .map_err(|error| translate(op, &args, error))
}

fn translate(op: &str, args: &impl Display, error: maildaemon_pop::Error) -> Error {
    use maildaemon_pop::Error as Pop;

    match error {
        Pop::Io(_) | Pop::Tls(_) | Pop::InvalidDnsName(_) => {
            Error::Transport(format!("{op}: {error}"))
        }
        other => Error::operation(op, args, other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::connection::Protocol;

    fn connection(password: &str) -> PopConnection<Mock> {
        PopConnection {
            settings: ConnectionSettings::new("pop", Protocol::Pop, "pop.example.com"),
            credentials: Credentials::new(Some("user".into()), Some(password.into())),
            client: None,
        }
    }

    #[tokio::test]
    async fn test_apop_refused_falls_back_to_user_pass() {
        let mock = Builder::new()
            .read(b"+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>\r\n")
            .write(b"APOP user 3f18b52881e44c0cc6067f46e0ced7bc\r\n")
            .read(b"-ERR APOP disabled\r\n")
            .write(b"USER user\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK maildrop locked\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let mut pop = connection("secret");

        pop.authenticate(client).await.unwrap();
        assert!(pop.client.is_some());
    }

    #[tokio::test]
    async fn test_refused_password_is_connect_error() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER user\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS nope\r\n")
            .read(b"-ERR invalid password\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let mut pop = connection("nope");

        let err = pop.authenticate(client).await.unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
        assert!(!pop.check_alive().await);
    }

    #[tokio::test]
    async fn test_only_inbox_exists() {
        let mut pop = connection("secret");

        let folders = pop.list_folders().await.unwrap();
        assert_eq!(folders, vec![FolderInfo::new("INBOX")]);
        pop.open_folder("INBOX").await.unwrap();
        let err = pop.open_folder("Archive").await.unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
        assert_eq!(pop.scan_mode(), FetchMode::Full);
    }

    #[tokio::test]
    async fn test_list_retrieve_delete_quit() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER user\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK\r\n")
            .write(b"LIST\r\n")
            .read(b"+OK 1 messages\r\n1 24\r\n.\r\n")
            .write(b"RETR 1\r\n")
            .read(b"+OK 24 octets\r\nSubject: hi\r\n\r\n..dots\r\n.\r\n")
            .write(b"DELE 1\r\n")
            .read(b"+OK deleted\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let mut pop = connection("secret");
        pop.authenticate(client).await.unwrap();

        let ids = pop.message_ids().await.unwrap();
        assert_eq!(ids, vec![MessageId(1)]);
        let messages = pop.fetch(&ids, FetchMode::Headers).await.unwrap();
        assert_eq!(messages[0].data, b"Subject: hi\r\n\r\n.dots\r\n".to_vec());
        assert!(messages[0].flags.is_empty());

        pop.delete("INBOX", MessageId(1)).await.unwrap();
        pop.shutdown().await.unwrap();
        assert!(pop.client.is_none());
    }
}
