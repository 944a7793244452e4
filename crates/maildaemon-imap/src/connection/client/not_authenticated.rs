//! Implementation for the not-authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::auth::xoauth2_response;
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::ResponseCode;
use crate::{Error, Rejected, Result};

/// Outcome of an authentication attempt.
pub type AuthResult<S> =
    std::result::Result<Client<S, Authenticated>, Rejected<Client<S, NotAuthenticated>>>;

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream and reads the server greeting.
    ///
    /// Capabilities announced in the greeting are kept. A BYE greeting is
    /// an error. A PREAUTH greeting is accepted here; the following LOGIN
    /// will then be refused by the server.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);

        let greeting = framed.read_response().await?;
        let mut capabilities = Vec::new();
        match ResponseParser::parse(&greeting)? {
            Response::Untagged(
                UntaggedResponse::Ok { code, .. } | UntaggedResponse::PreAuth { code, .. },
            ) => {
                if let Some(ResponseCode::Capability(caps)) = code {
                    capabilities = caps;
                }
            }
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => return Err(Error::Bye(text)),
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        }

        tracing::debug!(capabilities = capabilities.len(), "IMAP greeting received");
        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Logs in with a username and password.
    pub async fn login(mut self, username: &str, password: &str) -> AuthResult<S> {
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.execute(&command).await {
            Ok(_) => Ok(self.into_state(Authenticated)),
            Err(error) => Err(Rejected {
                client: self,
                error,
            }),
        }
    }

    /// Authenticates with SASL XOAUTH2 and a bearer token.
    ///
    /// When the server rejects the token it sends a continuation carrying a
    /// JSON error; the client answers with an empty line and the server then
    /// completes the command with NO.
    pub async fn authenticate_xoauth2(mut self, user: &str, token: &str) -> AuthResult<S> {
        match self.run_xoauth2(user, token).await {
            Ok(()) => Ok(self.into_state(Authenticated)),
            Err(error) => Err(Rejected {
                client: self,
                error,
            }),
        }
    }

    async fn run_xoauth2(&mut self, user: &str, token: &str) -> Result<()> {
        let tag = self.tag_gen.next_tag();
        let command = Command::Authenticate {
            mechanism: "XOAUTH2".to_string(),
            initial_response: Some(xoauth2_response(user, token)),
        };
        self.stream.write_command(&command.serialize(&tag)).await?;

        loop {
            let response = self.stream.read_response().await?;
            match ResponseParser::parse(&response)? {
                Response::Continuation { text } => {
                    tracing::debug!(challenge = ?text, "XOAUTH2 rejected by server");
                    self.stream.write_raw(b"\r\n").await?;
                }
                Response::Tagged { tag: resp_tag, .. } if resp_tag == tag => {
                    Self::check_tagged_ok(std::slice::from_ref(&response), &tag)?;
                    return Ok(());
                }
                Response::Tagged { .. } => {}
                Response::Untagged(UntaggedResponse::Capability(caps)) => self.capabilities = caps,
                Response::Untagged(_) => {}
            }
        }
    }

    /// Logs out without authenticating.
    pub async fn logout(self) -> Result<()> {
        self.logout_inner().await
    }
}
