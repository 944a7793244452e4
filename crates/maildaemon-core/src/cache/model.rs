//! Mirrored folders.

use std::collections::{BTreeMap, BTreeSet};

use crate::connection::{FolderInfo, MessageId};
use crate::message::Message;

/// Folder flag of folders that cannot be opened.
pub const NOSELECT: &str = "\\Noselect";

/// Where a cache is in its poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheState {
    /// Nothing mirrored yet, or the connection was lost.
    #[default]
    Disconnected,
    /// Folder list mirrors the server.
    FoldersSynced,
    /// Folder list and message sets mirror the server.
    MessagesSynced,
}

/// A mirrored folder.
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    name: String,
    flags: BTreeSet<String>,
    delimiter: Option<char>,
    pub(super) messages: BTreeMap<MessageId, Message>,
    pub(super) subfolders: BTreeSet<String>,
}

impl Folder {
    pub(super) fn new(info: FolderInfo) -> Self {
        Self {
            name: info.name,
            flags: info.flags,
            delimiter: info.delimiter,
            messages: BTreeMap::new(),
            subfolders: BTreeSet::new(),
        }
    }

    /// Takes over flags and delimiter from a newer listing. Returns true if
    /// anything changed.
    pub(super) fn refresh(&mut self, info: &FolderInfo) -> bool {
        let changed = self.flags != info.flags || self.delimiter != info.delimiter;
        if changed {
            self.flags.clone_from(&info.flags);
            self.delimiter = info.delimiter;
        }
        changed
    }

    /// Full folder name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server-side folder flags, e.g. `\Noselect`.
    #[must_use]
    pub const fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    /// Hierarchy delimiter.
    #[must_use]
    pub const fn delimiter(&self) -> Option<char> {
        self.delimiter
    }

    /// Returns false for folders that cannot be opened.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .flags
            .iter()
            .any(|flag| flag.eq_ignore_ascii_case(NOSELECT))
    }

    /// Full names of the direct children.
    #[must_use]
    pub const fn subfolders(&self) -> &BTreeSet<String> {
        &self.subfolders
    }

    /// Name of the parent folder according to the delimiter.
    #[must_use]
    pub fn parent_name(&self) -> Option<&str> {
        let delimiter = self.delimiter?;
        self.name.rsplit_once(delimiter).map(|(parent, _)| parent)
    }

    /// Looks up a message.
    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(&id)
    }

    /// Messages in identifier order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    /// Message identifiers in order.
    pub fn message_ids(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.messages.keys().copied()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the folder holds no message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
