//! Filter actions.

use std::fmt;

use crate::connection::{ConnectionGroup, FlagChange};
use crate::message::{ANSWERED, DELETED, FLAGGED, Message, SEEN};
use crate::{Error, Result};

/// Destination of a move or copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Connection name, `None` for the message's own connection.
    pub connection: Option<String>,
    /// Folder name.
    pub folder: String,
}

impl Target {
    /// Parses `connection/folder`, or `folder` when the text before the
    /// first `/` is not a connection in `group`.
    fn parse(text: &str, group: &ConnectionGroup) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let target = match text.split_once('/') {
            Some((connection, folder)) if group.contains(connection) && !folder.is_empty() => {
                Self {
                    connection: Some(connection.to_string()),
                    folder: folder.to_string(),
                }
            }
            _ => Self {
                connection: None,
                folder: text.to_string(),
            },
        };
        Some(target)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.connection {
            Some(connection) => write!(f, "{connection}/{}", self.folder),
            None => f.write_str(&self.folder),
        }
    }
}

/// A vetted filter action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Move the message.
    Move(Target),
    /// Copy the message.
    Copy(Target),
    /// Change the message flags.
    Mark(FlagChange),
}

impl Action {
    /// Parses an `operation:args` string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] naming `section` for unknown or not
    /// implemented operations and for missing arguments.
    pub fn parse(section: &str, text: &str, group: &ConnectionGroup) -> Result<Self> {
        let (operation, args) = text.split_once(':').unwrap_or((text, ""));
        let missing = || Error::construction(section, format!("action `{text}` needs an argument"));

        match operation.trim() {
            "move" => Target::parse(args, group).map(Self::Move).ok_or_else(missing),
            "copy" => Target::parse(args, group).map(Self::Copy).ok_or_else(missing),
            "mark" => mark(args.trim()).map(Self::Mark).ok_or_else(missing),
            "delete" | "reply" | "forward" => Err(Error::construction(
                section,
                format!("action `{}` is not implemented", operation.trim()),
            )),
            other => Err(Error::construction(
                section,
                format!("unknown action `{other}`"),
            )),
        }
    }

    /// Executes the action on the server the message came from.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying move, copy or flag store.
    pub async fn apply(&self, message: &Message, group: &mut ConnectionGroup) -> Result<()> {
        match self {
            Self::Move(target) => {
                let connection = target_connection(target, message, "move")?;
                message.move_to(group, &connection, &target.folder).await
            }
            Self::Copy(target) => {
                let connection = target_connection(target, message, "copy")?;
                message.copy_to(group, &connection, &target.folder).await
            }
            Self::Mark(change) => message.set_flag(group, change.clone()).await,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move(target) => write!(f, "move:{target}"),
            Self::Copy(target) => write!(f, "copy:{target}"),
            Self::Mark(change) => write!(f, "mark:{change}"),
        }
    }
}

fn mark(word: &str) -> Option<FlagChange> {
    let add = |flag: &str| FlagChange::Add(vec![flag.to_string()]);
    let remove = |flag: &str| FlagChange::Remove(vec![flag.to_string()]);

    let change = match word.to_ascii_lowercase().as_str() {
        "" => return None,
        "read" | "seen" => add(SEEN),
        "unread" | "unseen" => remove(SEEN),
        "flagged" => add(FLAGGED),
        "unflagged" => remove(FLAGGED),
        "answered" => add(ANSWERED),
        "unanswered" => remove(ANSWERED),
        "deleted" => add(DELETED),
        "undeleted" => remove(DELETED),
        _ => add(word),
    };
    Some(change)
}

fn target_connection(target: &Target, message: &Message, op: &str) -> Result<String> {
    target
        .connection
        .clone()
        .or_else(|| message.origin().map(|origin| origin.connection.clone()))
        .ok_or_else(|| Error::operation(op, target, "message has no origin"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::connection::StaticCredentials;

    fn group() -> ConnectionGroup {
        let section = json!({"archive": {"protocol": "IMAP", "domain": "archive.example.com"}});
        let serde_json::Value::Object(section) = section else {
            unreachable!()
        };
        ConnectionGroup::from_config(&section, Arc::new(StaticCredentials), None).unwrap()
    }

    #[test]
    fn test_target_resolution() {
        let group = group();

        let action = Action::parse("filter: f", "move:archive/2024", &group).unwrap();
        assert_eq!(
            action,
            Action::Move(Target {
                connection: Some("archive".into()),
                folder: "2024".into(),
            })
        );

        let action = Action::parse("filter: f", "copy:lists/rust", &group).unwrap();
        assert_eq!(
            action,
            Action::Copy(Target {
                connection: None,
                folder: "lists/rust".into(),
            })
        );
    }

    #[test]
    fn test_mark_words() {
        let group = group();
        let parse = |text: &str| Action::parse("filter: f", text, &group).unwrap();

        assert_eq!(parse("mark:read"), Action::Mark(FlagChange::Add(vec!["Seen".into()])));
        assert_eq!(parse("mark:unread"), Action::Mark(FlagChange::Remove(vec!["Seen".into()])));
        assert_eq!(
            parse("mark:Important"),
            Action::Mark(FlagChange::Add(vec!["Important".into()]))
        );
        assert_eq!(parse("mark:read").to_string(), "mark:+(Seen)");
    }

    #[test]
    fn test_rejected_actions() {
        let group = group();
        for (text, reason) in [
            ("delete", "not implemented"),
            ("forward:boss@example.com", "not implemented"),
            ("explode:now", "unknown action"),
            ("move:", "needs an argument"),
            ("mark", "needs an argument"),
        ] {
            let err = Action::parse("filter: f", text, &group).unwrap_err();
            assert!(matches!(err, Error::Construction { .. }));
            assert!(err.to_string().contains(reason), "{text}: {err}");
        }
    }

    #[tokio::test]
    async fn test_apply_without_origin_fails() {
        let mut group = group();
        let action = Action::parse("filter: f", "move:Archive", &group).unwrap();
        let message = Message::compose("a@example.com", &["b@example.com"], "s", "b");

        let err = action.apply(&message, &mut group).await.unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
    }
}
