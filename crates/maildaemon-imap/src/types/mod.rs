//! Core IMAP types.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod flags;
mod identifiers;
mod mailbox;
mod response_code;
mod sequence;

pub use capability::{Capability, Status};
pub use flags::{Flag, Flags};
pub use identifiers::{Tag, Uid, UidValidity};
pub use mailbox::{
    ListResponse, Mailbox, MailboxAttribute, MailboxStatus, decode_modified_utf7,
    encode_modified_utf7,
};
pub use response_code::ResponseCode;
pub use sequence::UidSet;
