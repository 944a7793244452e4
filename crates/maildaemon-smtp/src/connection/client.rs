//! Type-state SMTP client.

use std::collections::BTreeMap;
use std::io;
use std::marker::PhantomData;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::ReplyAssembler;
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// SMTP client with type-state pattern.
pub struct Client<S, State> {
    reader: BufReader<S>,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_info", &self.server_info)
            .finish_non_exhaustive()
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server
    /// does not greet with 220.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut client = Self {
            reader: BufReader::new(stream),
            server_info: ServerInfo::default(),
            _state: PhantomData,
        };

        let greeting = client.read_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::from_reply(&greeting));
        }

        client.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(client)
    }

    /// Sends EHLO and discovers server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        self.hello(client_hostname).await?;
        Ok(self)
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let encoded = STANDARD.encode(format!("\0{username}\0{password}"));
        let reply = self
            .send_command(&Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(encoded),
            })
            .await?;
        self.finish_auth(&reply)
    }

    /// Authenticates using the LOGIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let reply = self
            .send_command(&Command::Auth {
                mechanism: AuthMechanism::Login,
                initial_response: None,
            })
            .await?;
        expect_challenge(&reply)?;
        let reply = self.send_line(&STANDARD.encode(username)).await?;
        expect_challenge(&reply)?;
        let reply = self.send_line(&STANDARD.encode(password)).await?;
        self.finish_auth(&reply)
    }

    /// Authenticates using XOAUTH2 with a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is refused.
    pub async fn auth_xoauth2(
        mut self,
        user: &str,
        token: &str,
    ) -> Result<Client<S, Authenticated>> {
        let encoded = STANDARD.encode(format!("user={user}\x01auth=Bearer {token}\x01\x01"));
        let mut reply = self
            .send_command(&Command::Auth {
                mechanism: AuthMechanism::XOAuth2,
                initial_response: Some(encoded),
            })
            .await?;

        // A refused token comes back as a challenge carrying error details.
        if reply.code == ReplyCode::AUTH_CONTINUE {
            tracing::debug!(details = %reply.message_text(), "XOAUTH2 challenge");
            reply = self.send_line("").await?;
        }
        self.finish_auth(&reply)
    }

    fn finish_auth(self, reply: &Reply) -> Result<Client<S, Authenticated>> {
        if !reply.is_success() {
            return Err(Error::from_reply(reply));
        }
        Ok(Client {
            reader: self.reader,
            server_info: self.server_info,
            _state: PhantomData,
        })
    }
}

impl Client<SmtpStream, Connected> {
    /// Upgrades the connection to TLS using STARTTLS and repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not supported or if the upgrade fails.
    pub async fn starttls(mut self, hostname: &str, client_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.send_command(&Command::StartTls).await?;
        if !reply.is_success() {
            return Err(Error::from_reply(&reply));
        }

        let stream = self.reader.into_inner().upgrade_to_tls(hostname).await?;
        self.reader = BufReader::new(stream);

        // Extensions advertised before the upgrade are discarded.
        self.hello(client_hostname).await?;
        Ok(self)
    }
}

impl<State> Client<SmtpStream, State> {
    /// Returns true if the connection is encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.reader.get_ref().is_tls()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server information.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the underlying stream.
    #[must_use]
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer with 2xx.
    pub async fn noop(&mut self) -> Result<()> {
        let reply = self.send_command(&Command::Noop).await?;
        if !reply.is_success() {
            return Err(Error::from_reply(&reply));
        }
        Ok(())
    }

    /// Runs one mail transaction.
    ///
    /// Returns the reply to each accepted `RCPT TO`, keyed by recipient. If
    /// any recipient is refused nothing is sent: the transaction is reset and
    /// [`Error::RecipientsRejected`] lists the refusals.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender, any recipient or the message is refused.
    pub async fn send_mail(
        &mut self,
        from: &Address,
        recipients: &[Address],
        message: &[u8],
    ) -> Result<BTreeMap<String, Reply>> {
        if recipients.is_empty() {
            return Err(Error::Protocol("No recipients".into()));
        }
        if let Some(limit) = self.server_info.max_message_size()
            && message.len() > limit
        {
            return Err(Error::MessageTooLarge {
                size: message.len(),
                limit,
            });
        }

        let size = self.server_info.supports_size().then_some(message.len());
        let eight_bit = self.server_info.supports_8bitmime() && !message.is_ascii();
        let reply = self
            .send_command(&Command::MailFrom {
                from: from.clone(),
                size,
                eight_bit,
            })
            .await?;
        if !reply.is_success() {
            return Err(Error::from_reply(&reply));
        }

        let mut accepted = BTreeMap::new();
        let mut rejected = Vec::new();
        for rcpt in recipients {
            let reply = self.send_command(&Command::RcptTo { to: rcpt.clone() }).await?;
            if reply.is_success() {
                accepted.insert(rcpt.to_string(), reply);
            } else {
                tracing::warn!(recipient = %rcpt, code = %reply.code, "Recipient refused");
                rejected.push((rcpt.to_string(), reply));
            }
        }
        if !rejected.is_empty() {
            self.reset().await?;
            return Err(Error::RecipientsRejected(rejected));
        }

        let reply = self.send_command(&Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            self.reset().await?;
            return Err(Error::from_reply(&reply));
        }

        self.write_all(&dot_stuff(message)).await?;
        let reply = self.read_reply().await?;
        if !reply.is_success() {
            return Err(Error::from_reply(&reply));
        }

        tracing::debug!(recipients = accepted.len(), "Message accepted for delivery");
        Ok(accepted)
    }

    /// Aborts the current mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(&mut self) -> Result<()> {
        let reply = self.send_command(&Command::Rset).await?;
        if !reply.is_success() {
            return Err(Error::from_reply(&reply));
        }
        Ok(())
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(Error::from_reply(&reply));
        }
        Ok(())
    }

    async fn hello(&mut self, client_hostname: &str) -> Result<()> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        if !reply.is_success() {
            return Err(Error::from_reply(&reply));
        }

        // The first line is the server greeting, not an extension.
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        Ok(())
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::trace!(command = %cmd.redacted(), "SMTP >");
        self.write_all(&cmd.to_bytes()).await?;
        self.read_reply().await
    }

    async fn send_line(&mut self, line: &str) -> Result<Reply> {
        self.write_all(format!("{line}\r\n").as_bytes()).await?;
        self.read_reply().await
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut assembler = ReplyAssembler::new();
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }

            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            if let Some(reply) = assembler.push(line)? {
                tracing::trace!(code = %reply.code, "SMTP <");
                return Ok(reply);
            }
        }
    }
}

fn expect_challenge(reply: &Reply) -> Result<()> {
    if reply.code == ReplyCode::AUTH_CONTINUE {
        Ok(())
    } else {
        Err(Error::from_reply(reply))
    }
}

/// Prepares a message for DATA: CRLF line endings, leading dots doubled and
/// the terminating `.` line appended.
#[must_use]
pub fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 16);
    let body = message
        .strip_suffix(b"\r\n")
        .or_else(|| message.strip_suffix(b"\n"))
        .unwrap_or(message);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.starts_with(b".") {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}
