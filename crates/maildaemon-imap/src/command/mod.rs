//! IMAP command builder.
//!
//! Commands that touch messages are issued in their UID form only, so
//! results stay valid while other clients expunge and renumber.

mod serialize;
mod tag_generator;
mod types;

use crate::types::{Flag, Mailbox, Tag, UidSet};

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, FetchItems, SearchCriteria, StoreAction};

use serialize::{
    write_astring, write_fetch_items, write_flag_list, write_mailbox, write_search_criteria,
    write_store_action,
};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY
    Capability,
    /// NOOP
    Noop,
    /// LOGOUT
    Logout,
    /// LOGIN
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE with an optional initial response (SASL-IR).
    Authenticate {
        /// SASL mechanism name.
        mechanism: String,
        /// Base64 initial response.
        initial_response: Option<String>,
    },
    /// LIST
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// SELECT
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },
    /// CLOSE
    Close,
    /// EXPUNGE
    Expunge,
    /// UID SEARCH
    UidSearch {
        /// Search criteria.
        criteria: SearchCriteria,
    },
    /// UID FETCH
    UidFetch {
        /// Messages to fetch.
        uids: UidSet,
        /// Data items.
        items: FetchItems,
    },
    /// UID STORE
    UidStore {
        /// Messages to change.
        uids: UidSet,
        /// Flag operation.
        action: StoreAction,
        /// Suppress the untagged FETCH echo.
        silent: bool,
    },
    /// UID COPY
    UidCopy {
        /// Messages to copy.
        uids: UidSet,
        /// Destination mailbox.
        mailbox: Mailbox,
    },
    /// APPEND command line. The message itself follows as a synchronizing
    /// literal of `size` bytes once the server sends a continuation.
    Append {
        /// Destination mailbox.
        mailbox: Mailbox,
        /// Flags to set on the new message.
        flags: Vec<Flag>,
        /// Internal date, in IMAP `date-time` format.
        date: Option<String>,
        /// Message size in bytes.
        size: usize,
    },
}

impl Command {
    /// Serializes the command with the given tag, including the trailing
    /// CRLF.
    #[must_use]
    pub fn serialize(&self, tag: &Tag) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(tag.as_str().as_bytes());
        buf.push(b' ');

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),

            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTHENTICATE ");
                buf.extend_from_slice(mechanism.as_bytes());
                if let Some(resp) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(resp.as_bytes());
                }
            }

            Self::List { reference, pattern } => {
                buf.extend_from_slice(b"LIST ");
                write_astring(&mut buf, reference);
                buf.push(b' ');
                write_astring(&mut buf, pattern);
            }

            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_mailbox(&mut buf, mailbox);
            }

            Self::Close => buf.extend_from_slice(b"CLOSE"),
            Self::Expunge => buf.extend_from_slice(b"EXPUNGE"),

            Self::UidSearch { criteria } => {
                buf.extend_from_slice(b"UID SEARCH ");
                write_search_criteria(&mut buf, criteria);
            }

            Self::UidFetch { uids, items } => {
                buf.extend_from_slice(b"UID FETCH ");
                buf.extend_from_slice(uids.to_string().as_bytes());
                buf.push(b' ');
                write_fetch_items(&mut buf, items);
            }

            Self::UidStore {
                uids,
                action,
                silent,
            } => {
                buf.extend_from_slice(b"UID STORE ");
                buf.extend_from_slice(uids.to_string().as_bytes());
                buf.push(b' ');
                write_store_action(&mut buf, action, *silent);
            }

            Self::UidCopy { uids, mailbox } => {
                buf.extend_from_slice(b"UID COPY ");
                buf.extend_from_slice(uids.to_string().as_bytes());
                buf.push(b' ');
                write_mailbox(&mut buf, mailbox);
            }

            Self::Append {
                mailbox,
                flags,
                date,
                size,
            } => {
                buf.extend_from_slice(b"APPEND ");
                write_mailbox(&mut buf, mailbox);
                if !flags.is_empty() {
                    buf.push(b' ');
                    write_flag_list(&mut buf, flags);
                }
                if let Some(date) = date {
                    buf.extend_from_slice(b" \"");
                    buf.extend_from_slice(date.as_bytes());
                    buf.push(b'"');
                }
                buf.extend_from_slice(format!(" {{{size}}}").as_bytes());
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::types::Uid;

    use super::*;

    fn tag() -> Tag {
        Tag::new("A001")
    }

    fn uids(list: &[u32]) -> UidSet {
        UidSet::from_uids(list.iter().map(|&n| Uid::new(n).unwrap())).unwrap()
    }

    #[test]
    fn test_login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pa ss\"word".to_string(),
        };
        assert_eq!(
            cmd.serialize(&tag()),
            b"A001 LOGIN user@example.com \"pa ss\\\"word\"\r\n"
        );
    }

    #[test]
    fn test_authenticate_with_initial_response() {
        let cmd = Command::Authenticate {
            mechanism: "XOAUTH2".to_string(),
            initial_response: Some("dXNlcj0=".to_string()),
        };
        assert_eq!(cmd.serialize(&tag()), b"A001 AUTHENTICATE XOAUTH2 dXNlcj0=\r\n");
    }

    #[test]
    fn test_list_all() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(cmd.serialize(&tag()), b"A001 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn test_select_encodes_mailbox() {
        let cmd = Command::Select {
            mailbox: Mailbox::new("Entwürfe"),
        };
        assert_eq!(cmd.serialize(&tag()), b"A001 SELECT Entw&APw-rfe\r\n");

        let cmd = Command::Select {
            mailbox: Mailbox::new("Sent Items"),
        };
        assert_eq!(cmd.serialize(&tag()), b"A001 SELECT \"Sent Items\"\r\n");
    }

    #[test]
    fn test_uid_fetch_headers() {
        let cmd = Command::UidFetch {
            uids: uids(&[3, 1, 2, 9]),
            items: FetchItems::headers(),
        };
        assert_eq!(
            cmd.serialize(&tag()),
            b"A001 UID FETCH 1:3,9 (UID FLAGS INTERNALDATE RFC822.SIZE BODY.PEEK[HEADER])\r\n"
        );
    }

    #[test]
    fn test_uid_fetch_full() {
        let cmd = Command::UidFetch {
            uids: uids(&[7]),
            items: FetchItems::full(),
        };
        assert_eq!(
            cmd.serialize(&tag()),
            b"A001 UID FETCH 7 (UID FLAGS INTERNALDATE RFC822.SIZE BODY.PEEK[])\r\n"
        );
    }

    #[test]
    fn test_uid_store() {
        let cmd = Command::UidStore {
            uids: uids(&[4]),
            action: StoreAction::Add(vec![Flag::Seen, Flag::Keyword("$Work".to_string())]),
            silent: true,
        };
        assert_eq!(
            cmd.serialize(&tag()),
            b"A001 UID STORE 4 +FLAGS.SILENT (\\Seen $Work)\r\n"
        );

        let cmd = Command::UidStore {
            uids: uids(&[4]),
            action: StoreAction::Replace(vec![]),
            silent: false,
        };
        assert_eq!(cmd.serialize(&tag()), b"A001 UID STORE 4 FLAGS ()\r\n");
    }

    #[test]
    fn test_uid_copy() {
        let cmd = Command::UidCopy {
            uids: uids(&[10, 11]),
            mailbox: Mailbox::new("archive/notifications"),
        };
        assert_eq!(
            cmd.serialize(&tag()),
            b"A001 UID COPY 10:11 archive/notifications\r\n"
        );
    }

    #[test]
    fn test_uid_search() {
        let cmd = Command::UidSearch {
            criteria: SearchCriteria::And(vec![SearchCriteria::Unseen, SearchCriteria::Undeleted]),
        };
        assert_eq!(cmd.serialize(&tag()), b"A001 UID SEARCH UNSEEN UNDELETED\r\n");
    }

    #[test]
    fn test_append_line() {
        let cmd = Command::Append {
            mailbox: Mailbox::new("INBOX"),
            flags: vec![Flag::Seen],
            date: Some("01-Jan-2024 10:00:00 +0000".to_string()),
            size: 42,
        };
        assert_eq!(
            cmd.serialize(&tag()),
            b"A001 APPEND INBOX (\\Seen) \"01-Jan-2024 10:00:00 +0000\" {42}\r\n"
        );

        let bare = Command::Append {
            mailbox: Mailbox::new("INBOX"),
            flags: vec![],
            date: None,
            size: 0,
        };
        assert_eq!(bare.serialize(&tag()), b"A001 APPEND INBOX {0}\r\n");
    }
}
