//! Server-side actions on a fetched message.

use super::{DELETED, Message, Origin};
use crate::connection::{
    Connection, ConnectionGroup, FetchMode, FlagChange, FolderStore, RawMessage,
};
use crate::{Error, Result};

impl Message {
    /// Moves the message to `folder` on connection `target`.
    ///
    /// Within one connection this copies, then flags the original
    /// `Deleted`; it disappears at the next expunge. Across connections the
    /// full message is fetched from the origin, appended to the target with
    /// its flags and arrival time, then deleted from the origin. A failure
    /// between append and delete leaves a duplicate, never a loss.
    ///
    /// # Errors
    ///
    /// Returns an error if the message has no origin, a connection is
    /// unknown or lacks a capability, or any server call fails. Nothing is
    /// deleted unless the copy or append succeeded.
    pub async fn move_to(
        &self,
        group: &mut ConnectionGroup,
        target: &str,
        folder: &str,
    ) -> Result<()> {
        let origin = self.require_origin("move", folder)?;
        if origin.connection == target && origin.folder == folder {
            tracing::debug!(connection = target, folder, id = %origin.id, "Already in place");
            return Ok(());
        }

        if origin.connection == target {
            let store = folder_store(group, target, "move")?;
            store.copy(&origin.folder, &[origin.id], folder).await?;
            store
                .store_flags(
                    &origin.folder,
                    &[origin.id],
                    FlagChange::Add(vec![DELETED.to_string()]),
                    true,
                )
                .await?;
        } else {
            transfer(group, origin, target, folder).await?;
            connection(group, &origin.connection, "delete")?
                .as_source()
                .ok_or_else(|| Error::not_supported(&origin.connection, "delete"))?
                .delete(&origin.folder, origin.id)
                .await?;
        }

        tracing::info!(
            from = %format_args!("{}/{}", origin.connection, origin.folder),
            to = %format_args!("{target}/{folder}"),
            id = %origin.id,
            "Message moved"
        );
        Ok(())
    }

    /// Copies the message to `folder` on connection `target`. Copying onto
    /// itself does nothing.
    ///
    /// # Errors
    ///
    /// Same as [`Message::move_to`].
    pub async fn copy_to(
        &self,
        group: &mut ConnectionGroup,
        target: &str,
        folder: &str,
    ) -> Result<()> {
        let origin = self.require_origin("copy", folder)?;
        if origin.connection == target && origin.folder == folder {
            tracing::debug!(connection = target, folder, id = %origin.id, "Already in place");
            return Ok(());
        }

        if origin.connection == target {
            folder_store(group, target, "copy")?
                .copy(&origin.folder, &[origin.id], folder)
                .await?;
        } else {
            transfer(group, origin, target, folder).await?;
        }
        tracing::info!(to = %format_args!("{target}/{folder}"), id = %origin.id, "Message copied");
        Ok(())
    }

    /// Changes the message flags on its origin server.
    ///
    /// Local flags are left alone; the next cache update observes the
    /// change.
    ///
    /// # Errors
    ///
    /// Returns an error if the message has no origin, the origin connection
    /// cannot store flags or the server refuses.
    pub async fn set_flag(&self, group: &mut ConnectionGroup, change: FlagChange) -> Result<()> {
        let origin = self.require_origin("store", &change)?;
        folder_store(group, &origin.connection, "store")?
            .store_flags(&origin.folder, &[origin.id], change, true)
            .await
    }

    fn require_origin(&self, op: &str, args: impl std::fmt::Display) -> Result<&Origin> {
        self.origin()
            .ok_or_else(|| Error::operation(op, args, "message has no origin"))
    }
}

fn connection<'a>(
    group: &'a mut ConnectionGroup,
    name: &str,
    op: &str,
) -> Result<&'a mut (dyn Connection + 'static)> {
    group
        .get_mut(name)
        .ok_or_else(|| Error::operation(op, name, "no such connection"))
}

fn folder_store<'a>(
    group: &'a mut ConnectionGroup,
    name: &str,
    op: &str,
) -> Result<&'a mut dyn FolderStore> {
    connection(group, name, op)?
        .as_folder_store()
        .ok_or_else(|| Error::not_supported(name, op))
}

/// Fetches the complete message from its origin and appends it to
/// `target`/`folder`.
async fn transfer(
    group: &mut ConnectionGroup,
    origin: &Origin,
    target: &str,
    folder: &str,
) -> Result<()> {
    let raw: RawMessage = {
        let source = connection(group, &origin.connection, "fetch")?
            .as_source()
            .ok_or_else(|| Error::not_supported(&origin.connection, "fetch"))?;
        source.open_folder(&origin.folder).await?;
        source
            .fetch(&[origin.id], FetchMode::Full)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::operation("fetch", origin.id, "message no longer on server"))?
    };

    folder_store(group, target, "append")?
        .append(folder, &raw.data, &raw.flags, raw.internal_date.as_deref())
        .await
}
