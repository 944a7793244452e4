//! Type-state markers for IMAP client connection states.
//!
//! `NotAuthenticated` and `Authenticated` are plain markers; `Selected`
//! carries the mailbox the server confirmed along with what SELECT reported.

use crate::types::{Mailbox, MailboxStatus};

/// Before LOGIN or AUTHENTICATE succeeded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Logged in, no mailbox selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// A mailbox is selected.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: Mailbox,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Creates the state for a freshly selected mailbox.
    #[must_use]
    pub const fn new(mailbox: Mailbox, status: MailboxStatus) -> Self {
        Self { mailbox, status }
    }

    /// The selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Status reported by SELECT.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::UidValidity;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_states_are_send_sync() {
        assert_send_sync::<NotAuthenticated>();
        assert_send_sync::<Authenticated>();
        assert_send_sync::<Selected>();
    }

    #[test]
    fn test_selected_accessors() {
        let status = MailboxStatus {
            exists: 12,
            uid_validity: UidValidity::new(7),
            read_only: true,
            ..MailboxStatus::default()
        };
        let selected = Selected::new(Mailbox::new("Archive"), status);

        assert_eq!(selected.mailbox().as_str(), "Archive");
        assert_eq!(selected.status().exists, 12);
        assert!(selected.status().read_only);
    }
}
