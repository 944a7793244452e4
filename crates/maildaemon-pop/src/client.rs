//! Type-state POP3 client.
//!
//! - `Authorization`: after the greeting, until USER/PASS or APOP succeeds
//! - `Transaction`: mail drop locked, messages can be listed and fetched
//!
//! QUIT from `Transaction` enters the UPDATE state on the server, which is
//! when DELE takes effect.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::marker::PhantomData;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::command::Command;
use crate::response::{self, Status};
use crate::stream::PopStream;
use crate::{Error, Rejected, Result};

/// Type-state marker: credentials not yet accepted.
#[derive(Debug)]
pub struct Authorization;

/// Type-state marker: logged in, mail drop locked.
#[derive(Debug)]
pub struct Transaction;

/// Outcome of a login attempt.
pub type AuthResult<S> =
    std::result::Result<Client<S, Transaction>, Rejected<Client<S, Authorization>>>;

/// POP3 client connection with type-state.
pub struct Client<S, State> {
    reader: BufReader<S>,
    greeting: String,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("greeting", &self.greeting)
            .finish_non_exhaustive()
    }
}

impl<S> Client<S, Authorization>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the server greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut client = Self {
            reader: BufReader::new(stream),
            greeting: String::new(),
            _state: PhantomData,
        };

        let line = client.read_line().await?;
        match response::parse_status(&line)? {
            Status::Ok(text) => client.greeting = text,
            Status::Err(text) => return Err(Error::Err(text)),
        }
        Ok(client)
    }

    /// Returns the APOP timestamp of the greeting, if the server offers APOP.
    #[must_use]
    pub fn apop_timestamp(&self) -> Option<&str> {
        response::apop_timestamp(&self.greeting)
    }

    /// Logs in with APOP, which never sends the secret itself.
    pub async fn apop(mut self, name: &str, secret: &str) -> AuthResult<S> {
        let Some(timestamp) = self.apop_timestamp() else {
            return Err(Rejected {
                client: self,
                error: Error::ApopUnavailable,
            });
        };
        let command = Command::Apop {
            name: name.to_string(),
            digest: response::apop_digest(timestamp, secret),
        };

        match self.simple(&command).await {
            Ok(_) => Ok(self.into_transaction()),
            Err(error) => Err(Rejected {
                client: self,
                error,
            }),
        }
    }

    /// Logs in with USER and PASS.
    pub async fn login(mut self, user: &str, pass: &str) -> AuthResult<S> {
        let result = match self.simple(&Command::User(user.to_string())).await {
            Ok(_) => self.simple(&Command::Pass(pass.to_string())).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(_) => Ok(self.into_transaction()),
            Err(error) => Err(Rejected {
                client: self,
                error,
            }),
        }
    }

    /// Sends STLS. On success the caller must upgrade the transport
    /// before sending anything else.
    pub async fn stls(&mut self) -> Result<()> {
        self.simple(&Command::Stls).await.map(drop)
    }

    fn into_transaction(self) -> Client<S, Transaction> {
        Client {
            reader: self.reader,
            greeting: self.greeting,
            _state: PhantomData,
        }
    }
}

impl Client<PopStream, Authorization> {
    /// Runs the TLS handshake after a successful [`stls`](Self::stls).
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        let stream = self.reader.into_inner().upgrade(host).await?;
        Ok(Self {
            reader: BufReader::new(stream),
            greeting: self.greeting,
            _state: PhantomData,
        })
    }
}

impl<State> Client<PopStream, State> {
    /// Returns true if the connection is encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.reader.get_ref().is_tls()
    }
}

impl<S> Client<S, Transaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the message count and the drop size in octets.
    pub async fn stat(&mut self) -> Result<(u32, u64)> {
        let text = self.simple(&Command::Stat).await?;
        response::parse_stat(&text)
    }

    /// Lists `(message number, size)` for every message not marked deleted.
    pub async fn list(&mut self) -> Result<Vec<(u32, u64)>> {
        self.multiline(&Command::List(None))
            .await?
            .iter()
            .map(|line| response::parse_scan_listing(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// Lists `(message number, unique id)` for every message not marked
    /// deleted.
    pub async fn uidl(&mut self) -> Result<Vec<(u32, String)>> {
        self.multiline(&Command::Uidl(None))
            .await?
            .iter()
            .map(|line| response::parse_uid_listing(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// Retrieves a whole message.
    pub async fn retr(&mut self, msg: u32) -> Result<Vec<u8>> {
        let lines = self.multiline(&Command::Retr(msg)).await?;
        Ok(join_lines(lines))
    }

    /// Retrieves the header and the first `lines` body lines of a message.
    pub async fn top(&mut self, msg: u32, lines: u32) -> Result<Vec<u8>> {
        let data = self.multiline(&Command::Top { msg, lines }).await?;
        Ok(join_lines(data))
    }

    /// Marks a message deleted. It is removed when the session QUITs.
    pub async fn dele(&mut self, msg: u32) -> Result<()> {
        self.simple(&Command::Dele(msg)).await.map(drop)
    }

    /// Sends NOOP.
    pub async fn noop(&mut self) -> Result<()> {
        self.simple(&Command::Noop).await.map(drop)
    }

    /// Unmarks every message marked deleted in this session.
    pub async fn rset(&mut self) -> Result<()> {
        self.simple(&Command::Rset).await.map(drop)
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the greeting text after `+OK`.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Returns the underlying stream.
    #[must_use]
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Ends the session. From `Transaction` this commits deletions.
    pub async fn quit(mut self) -> Result<()> {
        self.simple(&Command::Quit).await.map(drop)
    }

    /// Sends a command and returns the text after `+OK`.
    async fn simple(&mut self, command: &Command) -> Result<String> {
        tracing::trace!(command = %command.redacted(), "POP3 command");
        let stream = self.reader.get_mut();
        stream.write_all(&command.serialize()).await?;
        stream.flush().await?;

        let line = self.read_line().await?;
        match response::parse_status(&line)? {
            Status::Ok(text) => Ok(text),
            Status::Err(text) => Err(Error::Err(text)),
        }
    }

    /// Sends a command whose success reply carries a dot-terminated body and
    /// returns the body lines, unstuffed and without line endings.
    async fn multiline(&mut self, command: &Command) -> Result<Vec<Vec<u8>>> {
        self.simple(command).await?;

        let mut lines = Vec::new();
        loop {
            let raw = self.read_raw_line().await?;
            match response::unstuff_line(&raw) {
                Some(line) => lines.push(line.to_vec()),
                None => return Ok(lines),
            }
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        let raw = self.read_raw_line().await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Reads one line and strips its CRLF (or bare LF).
    async fn read_raw_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line).await? == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        if line.ends_with(b"\n") {
            line.pop();
        }
        if line.ends_with(b"\r") {
            line.pop();
        }
        Ok(line)
    }
}

fn join_lines(lines: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = Vec::with_capacity(lines.iter().map(|l| l.len() + 2).sum());
    for line in lines {
        out.extend_from_slice(&line);
        out.extend_from_slice(b"\r\n");
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    const GREETING: &[u8] = b"+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>\r\n";

    #[tokio::test]
    async fn test_apop_login() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"APOP mrose c4c9334bac560ecc979e58001b3e22fb\r\n")
            .read(b"+OK mrose's maildrop has 2 messages (320 octets)\r\n")
            .write(b"STAT\r\n")
            .read(b"+OK 2 320\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let mut client = client.apop("mrose", "tanstaaf").await.unwrap();

        assert_eq!(client.stat().await.unwrap(), (2, 320));
    }

    #[tokio::test]
    async fn test_refused_apop_falls_back_to_user_pass() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"APOP me 3f18b52881e44c0cc6067f46e0ced7bc\r\n")
            .read(b"-ERR permission denied\r\n")
            .write(b"USER me\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS secret\r\n")
            .read(b"+OK logged in\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();

        let rejected = client.apop("me", "secret").await.unwrap_err();
        assert!(matches!(rejected.error, Error::Err(_)));
        rejected.client.login("me", "secret").await.unwrap();
    }

    #[tokio::test]
    async fn test_apop_without_timestamp_sends_nothing() {
        let mock = Builder::new().read(b"+OK ready\r\n").build();
        let client = Client::from_stream(mock).await.unwrap();

        let rejected = client.apop("me", "secret").await.unwrap_err();
        assert!(matches!(rejected.error, Error::ApopUnavailable));
    }

    #[tokio::test]
    async fn test_list_retr_and_quit() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER me\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS pw\r\n")
            .read(b"+OK\r\n")
            .write(b"LIST\r\n")
            .read(b"+OK 2 messages\r\n1 120\r\n2 200\r\n.\r\n")
            .write(b"RETR 1\r\n")
            .read(b"+OK 120 octets\r\nSubject: hi\r\n\r\n..dot\r\n.\r\n")
            .write(b"DELE 1\r\n")
            .read(b"+OK message 1 deleted\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let mut client = client.login("me", "pw").await.unwrap();

        assert_eq!(client.list().await.unwrap(), vec![(1, 120), (2, 200)]);
        assert_eq!(
            client.retr(1).await.unwrap(),
            b"Subject: hi\r\n\r\n.dot\r\n".to_vec()
        );
        client.dele(1).await.unwrap();
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_err_reply_on_retr() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER me\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS pw\r\n")
            .read(b"+OK\r\n")
            .write(b"RETR 9\r\n")
            .read(b"-ERR no such message\r\n")
            .write(b"UIDL\r\n")
            .read(b"+OK\r\n1 abc\r\n.\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let mut client = client.login("me", "pw").await.unwrap();

        let err = client.retr(9).await.unwrap_err();
        assert!(matches!(err, Error::Err(text) if text == "no such message"));
        assert_eq!(client.uidl().await.unwrap(), vec![(1, "abc".to_string())]);
    }

    #[tokio::test]
    async fn test_negative_greeting() {
        let mock = Builder::new().read(b"-ERR busy\r\n").build();
        assert!(matches!(
            Client::from_stream(mock).await,
            Err(Error::Err(_))
        ));
    }
}
