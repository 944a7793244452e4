//! Parsed response values.

use crate::types::{Capability, Flags, ListResponse, ResponseCode, Uid};

/// One data item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// FLAGS
    Flags(Flags),
    /// UID
    Uid(Uid),
    /// RFC822.SIZE
    Rfc822Size(u32),
    /// INTERNALDATE, as sent.
    InternalDate(String),
    /// `BODY[section]<origin>` or an RFC822 variant.
    Body {
        /// Section specifier, `None` for the whole message.
        section: Option<String>,
        /// Partial fetch origin.
        origin: Option<u32>,
        /// Content; `None` for NIL.
        data: Option<Vec<u8>>,
    },
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK`
    Ok {
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* NO`
    No {
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BAD`
    Bad {
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* PREAUTH` greeting.
    PreAuth {
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BYE`
    Bye {
        /// Response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY`
    Capability(Vec<Capability>),
    /// `* LIST`
    List(ListResponse),
    /// `* FLAGS`
    Flags(Flags),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(u32),
    /// `* n FETCH (...)`
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// Data items.
        items: Vec<FetchItem>,
    },
    /// `* SEARCH` results (UIDs for UID SEARCH).
    Search(Vec<u32>),
}
