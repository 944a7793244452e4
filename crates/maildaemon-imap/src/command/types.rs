//! Command arguments.

use crate::types::{Flag, UidSet};

/// FETCH data items to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItems(pub Vec<FetchAttribute>);

impl FetchItems {
    /// UID, flags, internal date, size and the header block.
    ///
    /// Uses `BODY.PEEK` so scanning a mailbox does not mark messages read.
    #[must_use]
    pub fn headers() -> Self {
        Self(vec![
            FetchAttribute::Uid,
            FetchAttribute::Flags,
            FetchAttribute::InternalDate,
            FetchAttribute::Rfc822Size,
            FetchAttribute::BodyPeek {
                section: Some("HEADER".to_string()),
            },
        ])
    }

    /// UID, flags, internal date, size and the complete message.
    #[must_use]
    pub fn full() -> Self {
        Self(vec![
            FetchAttribute::Uid,
            FetchAttribute::Flags,
            FetchAttribute::InternalDate,
            FetchAttribute::Rfc822Size,
            FetchAttribute::BodyPeek { section: None },
        ])
    }

    /// UID and flags only.
    #[must_use]
    pub fn flags() -> Self {
        Self(vec![FetchAttribute::Uid, FetchAttribute::Flags])
    }
}

/// One FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// UID.
    Uid,
    /// FLAGS.
    Flags,
    /// INTERNALDATE.
    InternalDate,
    /// RFC822.SIZE.
    Rfc822Size,
    /// `BODY.PEEK[section]`, the whole message when `section` is `None`.
    BodyPeek {
        /// Section specifier.
        section: Option<String>,
    },
}

/// STORE operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// `+FLAGS`
    Add(Vec<Flag>),
    /// `-FLAGS`
    Remove(Vec<Flag>),
    /// `FLAGS`
    Replace(Vec<Flag>),
}

impl StoreAction {
    pub(crate) const fn keyword(&self) -> &'static str {
        match self {
            Self::Add(_) => "+FLAGS",
            Self::Remove(_) => "-FLAGS",
            Self::Replace(_) => "FLAGS",
        }
    }

    pub(crate) fn flags(&self) -> &[Flag] {
        match self {
            Self::Add(flags) | Self::Remove(flags) | Self::Replace(flags) => flags,
        }
    }
}

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Messages with `\Seen`.
    Seen,
    /// Messages without `\Seen`.
    Unseen,
    /// Messages with `\Deleted`.
    Deleted,
    /// Messages without `\Deleted`.
    Undeleted,
    /// Messages in a UID set.
    Uid(UidSet),
    /// All of the criteria.
    And(Vec<Self>),
}
