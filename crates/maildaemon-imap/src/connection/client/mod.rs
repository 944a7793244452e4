//! Type-state IMAP client connection.
//!
//! The IMAP connection states are:
//!
//! - `NotAuthenticated`: after the greeting
//! - `Authenticated`: after LOGIN or AUTHENTICATE
//! - `Selected`: after SELECT
//!
//! Each state only exposes the commands valid in it. Transitions consume the
//! client; when the server refuses one, the client comes back inside a
//! [`Rejected`](crate::Rejected) in whatever state the protocol leaves it.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

pub use self::not_authenticated::AuthResult;
pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, Flag, Mailbox, ResponseCode, Status, Tag};
use crate::{Error, Result};

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Returns true if the server advertises the SASL mechanism.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| matches!(c, Capability::Auth(m) if m.eq_ignore_ascii_case(mechanism)))
    }

    /// Returns the underlying stream.
    #[must_use]
    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    /// Sends NOOP. Servers use the round trip to deliver pending updates.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute(&Command::Noop).await.map(drop)
    }

    /// Sends CAPABILITY and stores the result.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        self.execute(&Command::Capability).await?;
        Ok(self.capabilities.clone())
    }

    /// Runs a command to completion.
    ///
    /// Returns the untagged data that arrived before the tagged OK.
    /// CAPABILITY data, untagged or in the completion code, refreshes the
    /// stored capabilities.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Vec<UntaggedResponse>> {
        self.execute_with_code(command).await.map(|(data, _)| data)
    }

    /// Like [`execute`](Self::execute), also returning the response code
    /// of the tagged OK.
    pub(crate) async fn execute_with_code(
        &mut self,
        command: &Command,
    ) -> Result<(Vec<UntaggedResponse>, Option<ResponseCode>)> {
        let tag = self.tag_gen.next_tag();
        self.stream.write_command(&command.serialize(&tag)).await?;
        let responses = self.stream.read_until_tagged(&tag).await?;
        let code = Self::check_tagged_ok(&responses, &tag)?;
        if let Some(ResponseCode::Capability(caps)) = &code {
            self.capabilities.clone_from(caps);
        }
        Ok((self.collect_untagged(&responses), code))
    }

    fn collect_untagged(&mut self, responses: &[Vec<u8>]) -> Vec<UntaggedResponse> {
        let mut data = Vec::new();
        for bytes in responses {
            match ResponseParser::parse(bytes) {
                Ok(Response::Untagged(UntaggedResponse::Capability(caps))) => {
                    self.capabilities = caps;
                }
                Ok(Response::Untagged(untagged)) => data.push(untagged),
                Ok(_) => {}
                Err(e) => {
                    let line = String::from_utf8_lossy(bytes);
                    tracing::debug!(
                        error = %e,
                        line = %line.trim_end(),
                        "Skipping unparsable IMAP response"
                    );
                }
            }
        }
        data
    }

    /// Checks that the tagged response for `tag` is OK.
    pub(crate) fn check_tagged_ok(
        responses: &[Vec<u8>],
        tag: &Tag,
    ) -> Result<Option<ResponseCode>> {
        for bytes in responses.iter().rev() {
            if let Ok(Response::Tagged {
                tag: resp_tag,
                status,
                code,
                text,
            }) = ResponseParser::parse(bytes)
                && resp_tag == *tag
            {
                return match status {
                    Status::Ok | Status::PreAuth => Ok(code),
                    Status::No => Err(Error::No(text)),
                    Status::Bad => Err(Error::Bad(text)),
                    Status::Bye => Err(Error::Bye(text)),
                };
            }
        }

        Err(Error::Protocol("missing tagged response".to_string()))
    }

    /// Moves the connection into another state.
    pub(crate) fn into_state<T>(self, state: T) -> Client<S, T> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }

    /// Sends APPEND: the command line, then the message as a synchronizing
    /// literal once the server asks for it.
    pub(crate) async fn append_message(
        &mut self,
        mailbox: &Mailbox,
        flags: &[Flag],
        date: Option<&str>,
        message: &[u8],
    ) -> Result<()> {
        let tag = self.tag_gen.next_tag();
        let command = Command::Append {
            mailbox: mailbox.clone(),
            flags: flags.to_vec(),
            date: date.map(str::to_string),
            size: message.len(),
        };
        self.stream.write_command(&command.serialize(&tag)).await?;

        loop {
            let response = self.stream.read_response().await?;
            match ResponseParser::parse(&response)? {
                Response::Continuation { .. } => break,
                Response::Tagged { .. } => {
                    Self::check_tagged_ok(std::slice::from_ref(&response), &tag)?;
                    return Err(Error::Protocol(
                        "APPEND completed without sending the message".to_string(),
                    ));
                }
                Response::Untagged(_) => {}
            }
        }

        self.stream.write_raw(message).await?;
        self.stream.write_raw(b"\r\n").await?;

        let responses = self.stream.read_until_tagged(&tag).await?;
        Self::check_tagged_ok(&responses, &tag)?;
        self.collect_untagged(&responses);
        Ok(())
    }

    /// Sends LOGOUT and waits for the server to acknowledge it.
    ///
    /// A server that sends BYE and drops the connection without the tagged
    /// OK has still acknowledged the logout.
    pub(crate) async fn logout_inner(mut self) -> Result<()> {
        let tag = self.tag_gen.next_tag();
        self.stream
            .write_command(&Command::Logout.serialize(&tag))
            .await?;

        let mut saw_bye = false;
        loop {
            let response = match self.stream.read_response().await {
                Ok(response) => response,
                Err(Error::Io(e)) if saw_bye && e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            match ResponseParser::parse(&response) {
                Ok(Response::Untagged(UntaggedResponse::Bye { .. })) => saw_bye = true,
                Ok(Response::Tagged { tag: resp_tag, .. }) if resp_tag == tag => {
                    Self::check_tagged_ok(std::slice::from_ref(&response), &tag)?;
                    return Ok(());
                }
                _ => {}
            }
        }
    }
}
