//! Implementation for the authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::command::Command;
use crate::parser::UntaggedResponse;
use crate::types::{Flag, ListResponse, Mailbox, MailboxStatus, ResponseCode};
use crate::{Rejected, Result};

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Lists mailboxes matching `pattern` under `reference`.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        self.list_mailboxes(reference, pattern).await
    }

    /// Selects a mailbox.
    pub async fn select(
        mut self,
        mailbox: &Mailbox,
    ) -> std::result::Result<Client<S, Selected>, Rejected<Self>> {
        match self.select_status(mailbox).await {
            Ok(status) => Ok(self.into_state(Selected::new(mailbox.clone(), status))),
            Err(error) => Err(Rejected {
                client: self,
                error,
            }),
        }
    }

    /// Appends a message to a mailbox.
    pub async fn append(
        &mut self,
        mailbox: &Mailbox,
        flags: &[Flag],
        date: Option<&str>,
        message: &[u8],
    ) -> Result<()> {
        self.append_message(mailbox, flags, date, message).await
    }

    /// Logs out.
    pub async fn logout(self) -> Result<()> {
        self.logout_inner().await
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) async fn list_mailboxes(
        &mut self,
        reference: &str,
        pattern: &str,
    ) -> Result<Vec<ListResponse>> {
        let command = Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let data = self.execute(&command).await?;

        Ok(data
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::List(item) => Some(item),
                _ => None,
            })
            .collect())
    }

    /// Sends SELECT and collects the mailbox status it reports.
    pub(crate) async fn select_status(&mut self, mailbox: &Mailbox) -> Result<MailboxStatus> {
        let command = Command::Select {
            mailbox: mailbox.clone(),
        };
        let (data, code) = self.execute_with_code(&command).await?;
        let mut status = mailbox_status(data);
        status.read_only = matches!(code, Some(ResponseCode::ReadOnly));
        tracing::debug!(
            mailbox = %mailbox,
            exists = status.exists,
            read_only = status.read_only,
            "Mailbox selected"
        );
        Ok(status)
    }
}

/// Builds the mailbox status from the untagged data of a SELECT.
fn mailbox_status(data: Vec<UntaggedResponse>) -> MailboxStatus {
    let mut status = MailboxStatus::default();

    for untagged in data {
        match untagged {
            UntaggedResponse::Exists(n) => status.exists = n,
            UntaggedResponse::Recent(n) => status.recent = n,
            UntaggedResponse::Flags(flags) => status.flags = flags,
            UntaggedResponse::Ok {
                code: Some(code), ..
            } => match code {
                ResponseCode::UidValidity(v) => status.uid_validity = Some(v),
                ResponseCode::UidNext(v) => status.uid_next = Some(v),
                ResponseCode::PermanentFlags(flags) => {
                    status.permanent_flags = flags.into_iter().collect();
                }
                _ => {}
            },
            _ => {}
        }
    }

    status
}
