//! Response codes.

use super::{Capability, Flag, Uid, UidValidity};

/// Bracketed response code attached to a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: text that must be shown to the user.
    Alert,
    /// CAPABILITY list sent with the greeting or a login reply.
    Capability(Vec<Capability>),
    /// PERMANENTFLAGS: flags the client can change permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: mailbox selected read-only.
    ReadOnly,
    /// READ-WRITE: mailbox selected read-write.
    ReadWrite,
    /// TRYCREATE: target mailbox does not exist.
    TryCreate,
    /// UIDNEXT: next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY of the selected mailbox.
    UidValidity(UidValidity),
    /// UNSEEN: first unseen message sequence number.
    Unseen(u32),
    /// Any other code, by name.
    Unknown(String),
}
