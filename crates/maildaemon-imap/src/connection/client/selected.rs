//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::command::{Command, FetchItems, SearchCriteria, StoreAction};
use crate::fetch::{FetchedMessage, merge_fetch_responses};
use crate::parser::UntaggedResponse;
use crate::types::{Flag, ListResponse, Mailbox, MailboxStatus, Uid, UidSet};
use crate::{Rejected, Result};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// The selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        self.state.mailbox()
    }

    /// Status reported when the mailbox was selected.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        self.state.status()
    }

    /// Closes the mailbox, expunging messages flagged `\Deleted`.
    pub async fn close(mut self) -> std::result::Result<Client<S, Authenticated>, Rejected<Self>> {
        match self.execute(&Command::Close).await {
            Ok(_) => Ok(self.into_state(Authenticated)),
            Err(error) => Err(Rejected {
                client: self,
                error,
            }),
        }
    }

    /// Selects another mailbox.
    ///
    /// A failed SELECT leaves no mailbox selected, so the client comes back
    /// authenticated.
    pub async fn select(
        mut self,
        mailbox: &Mailbox,
    ) -> std::result::Result<Self, Rejected<Client<S, Authenticated>>> {
        match self.select_status(mailbox).await {
            Ok(status) => {
                self.state = Selected::new(mailbox.clone(), status);
                Ok(self)
            }
            Err(error) => Err(Rejected {
                client: self.into_state(Authenticated),
                error,
            }),
        }
    }

    /// Lists mailboxes matching `pattern` under `reference`.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        self.list_mailboxes(reference, pattern).await
    }

    /// Returns the UIDs of messages matching `criteria`.
    pub async fn uid_search(&mut self, criteria: SearchCriteria) -> Result<Vec<Uid>> {
        let data = self.execute(&Command::UidSearch { criteria }).await?;

        Ok(data
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::Search(ids) => Some(ids),
                _ => None,
            })
            .flatten()
            .filter_map(Uid::new)
            .collect())
    }

    /// Fetches data for the given UIDs, one merged record per message.
    pub async fn uid_fetch(
        &mut self,
        uids: &UidSet,
        items: FetchItems,
    ) -> Result<Vec<FetchedMessage>> {
        let command = Command::UidFetch {
            uids: uids.clone(),
            items,
        };
        let data = self.execute(&command).await?;

        Ok(merge_fetch_responses(data.into_iter().filter_map(
            |untagged| match untagged {
                UntaggedResponse::Fetch { seq, items } => Some((seq, items)),
                _ => None,
            },
        )))
    }

    /// Changes flags on the given UIDs.
    pub async fn uid_store(
        &mut self,
        uids: &UidSet,
        action: StoreAction,
        silent: bool,
    ) -> Result<()> {
        let command = Command::UidStore {
            uids: uids.clone(),
            action,
            silent,
        };
        self.execute(&command).await.map(drop)
    }

    /// Copies the given UIDs to another mailbox.
    pub async fn uid_copy(&mut self, uids: &UidSet, mailbox: &Mailbox) -> Result<()> {
        let command = Command::UidCopy {
            uids: uids.clone(),
            mailbox: mailbox.clone(),
        };
        self.execute(&command).await.map(drop)
    }

    /// Removes messages flagged `\Deleted`.
    ///
    /// Returns the sequence numbers reported as expunged.
    pub async fn expunge(&mut self) -> Result<Vec<u32>> {
        let data = self.execute(&Command::Expunge).await?;

        Ok(data
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::Expunge(seq) => Some(seq),
                _ => None,
            })
            .collect())
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

    /// Logs out without closing the mailbox.
    pub async fn logout(self) -> Result<()> {
        self.logout_inner().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::Error;

    const PRELUDE: [&[u8]; 5] = [
        b"* OK ready\r\n",
        b"A0000 LOGIN user pass\r\n",
        b"A0000 OK done\r\n",
        b"A0001 SELECT INBOX\r\n",
        b"A0001 OK [READ-WRITE] SELECT completed\r\n",
    ];

    fn builder() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(PRELUDE[0])
            .write(PRELUDE[1])
            .read(PRELUDE[2])
            .write(PRELUDE[3])
            .read(PRELUDE[4]);
        builder
    }

    async fn selected(mock: Mock) -> Client<Mock, Selected> {
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("user", "pass").await.unwrap();
        client.select(&Mailbox::new("INBOX")).await.unwrap()
    }

    fn uid_set(list: &[u32]) -> UidSet {
        UidSet::from_uids(list.iter().map(|&n| Uid::new(n).unwrap())).unwrap()
    }

    #[tokio::test]
    async fn test_uid_search() {
        let mock = builder()
            .write(b"A0002 UID SEARCH ALL\r\n")
            .read(b"* SEARCH 3 17 42\r\n")
            .read(b"A0002 OK SEARCH completed\r\n")
            .build();
        let mut client = selected(mock).await;

        let uids = client.uid_search(SearchCriteria::All).await.unwrap();
        let uids: Vec<u32> = uids.into_iter().map(Uid::get).collect();
        assert_eq!(uids, vec![3, 17, 42]);
    }

    #[tokio::test]
    async fn test_uid_fetch_merges_segments() {
        let mock = builder()
            .write(b"A0002 UID FETCH 42 (UID FLAGS)\r\n")
            .read(b"* 3 FETCH (FLAGS (\\Seen))\r\n")
            .read(b"* 3 FETCH (UID 42)\r\n")
            .read(b"* 4 EXISTS\r\n")
            .read(b"A0002 OK FETCH completed\r\n")
            .build();
        let mut client = selected(mock).await;

        let records = client
            .uid_fetch(&uid_set(&[42]), FetchItems::flags())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uid, Uid::new(42));
        assert!(records[0].flags.as_ref().unwrap().is_seen());
    }

    #[tokio::test]
    async fn test_uid_store_and_copy() {
        let mock = builder()
            .write(b"A0002 UID STORE 7 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0002 OK STORE completed\r\n")
            .write(b"A0003 UID COPY 7 Archive\r\n")
            .read(b"A0003 NO [TRYCREATE] No such mailbox\r\n")
            .build();
        let mut client = selected(mock).await;

        client
            .uid_store(&uid_set(&[7]), StoreAction::Add(vec![Flag::Deleted]), true)
            .await
            .unwrap();
        let err = client
            .uid_copy(&uid_set(&[7]), &Mailbox::new("Archive"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::No(_)));
    }

    #[tokio::test]
    async fn test_expunge_reports_sequence_numbers() {
        let mock = builder()
            .write(b"A0002 EXPUNGE\r\n")
            .read(b"* 3 EXPUNGE\r\n")
            .read(b"* 3 EXPUNGE\r\n")
            .read(b"A0002 OK EXPUNGE completed\r\n")
            .build();
        let mut client = selected(mock).await;

        assert_eq!(client.expunge().await.unwrap(), vec![3, 3]);
    }

    #[tokio::test]
    async fn test_failed_reselect_deselects() {
        let mock = builder()
            .write(b"A0002 SELECT Gone\r\n")
            .read(b"A0002 NO no such mailbox\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE logging out\r\n")
            .read(b"A0003 OK LOGOUT completed\r\n")
            .build();
        let client = selected(mock).await;

        let rejected = client.select(&Mailbox::new("Gone")).await.unwrap_err();
        let authenticated: Client<Mock, Authenticated> = rejected.client;
        authenticated.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_close() {
        let mock = builder()
            .write(b"A0002 CLOSE\r\n")
            .read(b"A0002 OK CLOSE completed\r\n")
            .build();
        let client = selected(mock).await;
        assert_eq!(client.mailbox().as_str(), "INBOX");

        client.close().await.unwrap();
    }
}
