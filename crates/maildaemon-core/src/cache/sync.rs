//! Reconciliation of a mirror against its server.

use std::collections::{BTreeMap, BTreeSet};

use super::model::{CacheState, Folder};
use crate::connection::{FolderInfo, MessageId, MessageSource};
use crate::message::Message;
use crate::{Error, Result};

/// Local mirror of the folders and messages of one connection.
#[derive(Debug, Clone)]
pub struct EmailCache {
    connection: String,
    folders: BTreeMap<String, Folder>,
    state: CacheState,
}

impl EmailCache {
    /// Creates an empty mirror for the named connection.
    #[must_use]
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            folders: BTreeMap::new(),
            state: CacheState::Disconnected,
        }
    }

    /// Name of the mirrored connection.
    #[must_use]
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CacheState {
        self.state
    }

    /// Drops everything mirrored.
    pub fn clear(&mut self) {
        self.folders.clear();
        self.state = CacheState::Disconnected;
    }

    /// Mirrors the server's folder list.
    ///
    /// Vanished folders are dropped, new ones created empty and changed
    /// flags overwritten. Subfolder sets are recomputed.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails; the mirror is left as it was.
    pub async fn update_folders(&mut self, source: &mut dyn MessageSource) -> Result<()> {
        let listing = source.list_folders().await?;
        let remote: BTreeMap<String, FolderInfo> = listing
            .into_iter()
            .map(|info| (info.name.clone(), info))
            .collect();

        self.folders.retain(|name, _| {
            let keep = remote.contains_key(name);
            if !keep {
                tracing::info!(connection = %self.connection, folder = %name, "Folder removed");
            }
            keep
        });

        for (name, info) in remote {
            match self.folders.get_mut(&name) {
                Some(folder) => {
                    if folder.refresh(&info) {
                        tracing::debug!(
                            connection = %self.connection,
                            folder = %name,
                            flags = ?info.flags,
                            "Folder flags changed"
                        );
                    }
                }
                None => {
                    tracing::debug!(connection = %self.connection, folder = %name, "Folder added");
                    self.folders.insert(name, Folder::new(info));
                }
            }
        }

        self.link_subfolders();
        self.state = CacheState::FoldersSynced;
        Ok(())
    }

    /// Mirrors the messages of one folder.
    ///
    /// New identifiers are fetched in the source's scan mode, known ones
    /// only have their flags refreshed and vanished ones are dropped.
    /// Folders that cannot be opened are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder is unknown or listing or fetching
    /// fails after the folder was opened.
    pub async fn update_messages_in(
        &mut self,
        source: &mut dyn MessageSource,
        folder: &str,
    ) -> Result<()> {
        let selectable = self
            .folders
            .get(folder)
            .ok_or_else(|| Error::operation("update", folder, "folder not in cache"))?
            .is_selectable();
        if !selectable {
            tracing::trace!(connection = %self.connection, folder, "Skipping \\Noselect folder");
            return Ok(());
        }

        if let Err(e) = source.open_folder(folder).await {
            tracing::warn!(
                connection = %self.connection,
                folder,
                error = %e,
                "Cannot open folder, skipping"
            );
            return Ok(());
        }
        let synced = self.sync_open_folder(source, folder).await;
        let closed = source.close_folder().await;
        synced?;
        closed
    }

    async fn sync_open_folder(&mut self, source: &mut dyn MessageSource, name: &str) -> Result<()> {
        let ids = source.message_ids().await?;
        let mode = source.scan_mode();

        let Some(folder) = self.folders.get_mut(name) else {
            return Ok(());
        };
        let (known, new): (Vec<MessageId>, Vec<MessageId>) = ids
            .iter()
            .copied()
            .partition(|id| folder.messages.contains_key(id));

        let fetched = if new.is_empty() {
            Vec::new()
        } else {
            source.fetch(&new, mode).await?
        };
        let flags = if known.is_empty() {
            Vec::new()
        } else {
            source.fetch_flags(&known).await?
        };

        let current: BTreeSet<MessageId> = ids.into_iter().collect();
        let before = folder.messages.len();
        folder.messages.retain(|id, _| current.contains(id));
        let removed = before - folder.messages.len();

        for (id, flags) in flags {
            if let Some(message) = folder.messages.get_mut(&id) {
                message.flags = flags;
            }
        }
        let added = fetched.len();
        for raw in fetched {
            folder
                .messages
                .insert(raw.id, Message::from_raw(&raw, &self.connection, name));
        }

        if added > 0 || removed > 0 {
            tracing::info!(
                connection = %self.connection,
                folder = name,
                added,
                removed,
                total = folder.messages.len(),
                "Folder updated"
            );
        }
        Ok(())
    }

    /// Mirrors the folder list, then the messages of every folder.
    ///
    /// # Errors
    ///
    /// Returns the first error; later folders are not synced then.
    pub async fn update(&mut self, source: &mut dyn MessageSource) -> Result<()> {
        self.update_folders(source).await?;
        let names: Vec<String> = self.folders.keys().cloned().collect();
        for name in names {
            self.update_messages_in(source, &name).await?;
        }
        self.state = CacheState::MessagesSynced;
        Ok(())
    }

    /// Looks up a folder.
    #[must_use]
    pub fn folder(&self, name: &str) -> Option<&Folder> {
        self.folders.get(name)
    }

    /// Folders in name order.
    pub fn folders(&self) -> impl Iterator<Item = &Folder> {
        self.folders.values()
    }

    /// Looks up a message.
    #[must_use]
    pub fn message(&self, folder: &str, id: MessageId) -> Option<&Message> {
        self.folders.get(folder)?.message(id)
    }

    /// Every message of every folder.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.folders.values().flat_map(Folder::messages)
    }

    fn link_subfolders(&mut self) {
        let links: Vec<(String, String)> = self
            .folders
            .values()
            .filter_map(|folder| {
                let parent = folder.parent_name()?;
                self.folders
                    .contains_key(parent)
                    .then(|| (parent.to_string(), folder.name().to_string()))
            })
            .collect();

        for folder in self.folders.values_mut() {
            folder.subfolders.clear();
        }
        for (parent, child) in links {
            if let Some(folder) = self.folders.get_mut(&parent) {
                folder.subfolders.insert(child);
            }
        }
    }
}
