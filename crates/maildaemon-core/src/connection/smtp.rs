//! SMTP session with an outbox.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;
use maildaemon_smtp::{Address, AuthMechanism, Authenticated, Client, Connected, SmtpStream};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Connection, ConnectionSettings, Credentials, DeliveryStatus, MessageSender, timed};
use crate::message::Message;
use crate::{Error, Result};

/// Hostname announced in EHLO.
const CLIENT_HOSTNAME: &str = "localhost";

/// SMTP connection.
///
/// Without `ssl` the session is upgraded with STARTTLS before
/// authenticating whenever the server offers it.
pub struct SmtpConnection<S = SmtpStream> {
    settings: ConnectionSettings,
    credentials: Credentials,
    client: Option<Client<S, Authenticated>>,
    outbox: Vec<Message>,
}

impl SmtpConnection {
    /// Creates a disconnected SMTP connection.
    #[must_use]
    pub const fn new(settings: ConnectionSettings, credentials: Credentials) -> Self {
        Self {
            settings,
            credentials,
            client: None,
            outbox: Vec::new(),
        }
    }

    async fn open(&self) -> Result<Client<SmtpStream, Connected>> {
        let host = &self.settings.domain;
        let stream = run(
            "connect",
            host,
            SmtpStream::connect(host, self.settings.port(), self.settings.ssl),
        )
        .await?;
        let client = run("connect", host, Client::from_stream(stream)).await?;
        let client = run("ehlo", CLIENT_HOSTNAME, client.ehlo(CLIENT_HOSTNAME)).await?;

        if client.is_tls() || !client.server_info().supports_starttls() {
            if !client.is_tls() {
                tracing::warn!(
                    connection = %self.settings.name,
                    "STARTTLS not offered, staying in plaintext"
                );
            }
            return Ok(client);
        }
        let client = run("starttls", host, client.starttls(host, CLIENT_HOSTNAME)).await?;
        tracing::info!(connection = %self.settings.name, "Connection upgraded to TLS");
        Ok(client)
    }
}

impl<S> SmtpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Authenticates a session that has completed EHLO: XOAUTH2 with
    /// `oauth`, otherwise PLAIN, or LOGIN when it is the only password
    /// mechanism offered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if credentials are missing or refused.
    pub async fn authenticate(&mut self, client: Client<S, Connected>) -> Result<()> {
        let name = self.settings.name.clone();
        let connect_error = |reason: String| Error::Connect {
            connection: name.clone(),
            reason,
        };

        let login = self
            .credentials
            .login(&self.settings)
            .map_err(|e| connect_error(e.to_string()))?;

        let authenticated = if self.settings.oauth {
            let token = self
                .credentials
                .bearer_token(&self.settings)
                .map_err(|e| connect_error(e.to_string()))?;
            run("auth", "XOAUTH2", client.auth_xoauth2(&login, &token)).await
        } else {
            let password = self
                .credentials
                .password(&self.settings)
                .map_err(|e| connect_error(e.to_string()))?;
            let mechanisms = client.server_info().auth_mechanisms();
            if mechanisms.contains(&AuthMechanism::Login)
                && !mechanisms.contains(&AuthMechanism::Plain)
            {
                run("auth", "LOGIN", client.auth_login(&login, &password)).await
            } else {
                run("auth", "PLAIN", client.auth_plain(&login, &password)).await
            }
        }
        .map_err(|e| connect_error(e.to_string()))?;

        self.client = Some(authenticated);
        tracing::info!(connection = %name, user = %login, "Logged in");
        Ok(())
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

    /// Sends QUIT.
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
            })
    }
}

#[async_trait]
impl Connection for SmtpConnection {
    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn connect(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }
        let client = self.open().await.map_err(|e| Error::Connect {
            connection: self.settings.name.clone(),
            reason: e.to_string(),
        })?;
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

    fn as_sender(&mut self) -> Option<&mut dyn MessageSender> {
        Some(self)
    }
}

#[async_trait]
impl<S> MessageSender for SmtpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: &Message) -> Result<BTreeMap<String, DeliveryStatus>> {
        let recipients: Vec<&str> = message.to.iter().map(|to| to.address.as_str()).collect();
        let args = recipients.join(", ");

        let from = message
            .from
            .as_ref()
            .ok_or_else(|| Error::operation("send", &args, "message has no sender"))?;
        let from = Address::new(from.address.as_str())
            .map_err(|e| Error::operation("send", &args, e))?;
        let recipients = recipients
            .into_iter()
            .map(Address::new)
            .collect::<maildaemon_smtp::Result<Vec<_>>>()
            .map_err(|e| Error::operation("send", &args, e))?;
        let data = message.to_rfc5322();

        let client = self
            .client
            .as_mut()
            .ok_or_else(|| Error::Transport(format!("{}: not connected", self.settings.name)))?;
        let accepted = run("send", &args, client.send_mail(&from, &recipients, &data)).await?;

        tracing::info!(
            connection = %self.settings.name,
            recipients = %args,
            "Message sent"
        );
        Ok(accepted
            .into_iter()
            .map(|(recipient, reply)| {
                (
                    recipient,
                    DeliveryStatus {
                        code: reply.code.as_u16(),
                        message: reply.message_text(),
                    },
                )
            })
            .collect())
    }

    fn queue(&mut self, message: Message) {
        self.outbox.push(message);
    }

    fn outbox(&self) -> &[Message] {
        &self.outbox
    }

    async fn flush_outbox(&mut self) -> Result<usize> {
        let mut sent = 0;
        while let Some(message) = self.outbox.first().cloned() {
            self.send(&message).await?;
            self.outbox.remove(0);
            sent += 1;
        }
        if sent > 0 {
            tracing::debug!(connection = %self.settings.name, sent, "Outbox flushed");
        }
        Ok(sent)
    }
}

/// Awaits an SMTP call under the socket timeout and translates its error.
async fn run<T, F>(op: &str, args: impl Display, future: F) -> Result<T>
where
    F: Future<Output = maildaemon_smtp::Result<T>>,
{
    timed(op, future)
        .await?
        .map_err(|error| translate(op, &args, error))
}

fn translate(op: &str, args: &impl Display, error: maildaemon_smtp::Error) -> Error {
    use maildaemon_smtp::Error as Smtp;

    match error {
        Smtp::Io(_) | Smtp::Tls(_) => Error::Transport(format!("{op}: {error}")),
        other => Error::operation(op, args, other),
    }
}
