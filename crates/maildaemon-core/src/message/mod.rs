//! Normalized messages.
//!
//! A [`Message`] is built once per fetch from the raw MIME tree and keeps an
//! [`Origin`] handle (connection name, folder, server id) instead of a
//! reference to the session it came from. Actions that change the message on
//! the server resolve that handle through a [`ConnectionGroup`].
//!
//! [`ConnectionGroup`]: crate::ConnectionGroup

mod address;
mod date;
mod dispatch;

use std::collections::BTreeSet;
use std::fmt::{self, Write};

use chrono::{DateTime, FixedOffset, Local};
use maildaemon_mime::encoding::{decode_rfc2047, decode_rfc2047_lossy, encode_rfc2047};
use maildaemon_mime::{Body, Entity};

pub use address::EmailAddress;

use crate::connection::{MessageId, RawMessage};

/// Flag set by the server once a message was read.
pub const SEEN: &str = "Seen";
/// Flag for answered messages.
pub const ANSWERED: &str = "Answered";
/// Flag for flagged (starred) messages.
pub const FLAGGED: &str = "Flagged";
/// Flag for messages marked for deletion.
pub const DELETED: &str = "Deleted";

/// Where a fetched message lives on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    /// Connection name.
    pub connection: String,
    /// Folder name.
    pub folder: String,
    /// Server-side identifier within the folder.
    pub id: MessageId,
}

/// A non-text body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// File name, if the part carries one.
    pub filename: Option<String>,
    /// Decoded content.
    pub data: Vec<u8>,
}

/// An email message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    origin: Option<Origin>,
    /// Sender.
    pub from: Option<EmailAddress>,
    /// Reply address.
    pub reply_to: Option<EmailAddress>,
    /// Recipients of the `To` header, in order.
    pub to: Vec<EmailAddress>,
    /// Decoded subject.
    pub subject: String,
    /// Parsed `Date` header.
    pub datetime: Option<DateTime<FixedOffset>>,
    /// `Message-ID` header.
    pub message_id: Option<String>,
    /// `Return-Path` header.
    pub return_path: Option<String>,
    /// `Envelope-To` header.
    pub envelope_to: Option<String>,
    /// Top-level `Content-Type` header.
    pub content_type: Option<String>,
    /// Every `Received` header, in order.
    pub received: Vec<String>,
    /// Remaining headers, in order, duplicates kept.
    pub other_headers: Vec<(String, String)>,
    /// Flags without the leading backslash.
    pub flags: BTreeSet<String>,
    /// Decoded text parts.
    pub contents: Vec<String>,
    /// Non-text parts.
    pub attachments: Vec<Attachment>,
    /// Server arrival time, verbatim.
    pub internal_date: Option<String>,
}

impl Message {
    /// Builds a message from a fetched record.
    ///
    /// Unparsable data yields a message with only its origin and flags.
    #[must_use]
    pub fn from_raw(raw: &RawMessage, connection: &str, folder: &str) -> Self {
        let mut message = match Entity::parse(&raw.data) {
            Ok(entity) => Self::from_entity(&entity),
            Err(e) => {
                tracing::warn!(connection, folder, id = %raw.id, error = %e, "Unparsable message");
                Self::default()
            }
        };
        message.origin = Some(Origin {
            connection: connection.to_string(),
            folder: folder.to_string(),
            id: raw.id,
        });
        message.flags.clone_from(&raw.flags);
        message.internal_date.clone_from(&raw.internal_date);
        message
    }

    /// Builds a message without origin from a MIME entity.
    #[must_use]
    pub fn from_entity(entity: &Entity) -> Self {
        let mut message = Self::default();

        for (name, value) in entity.headers.iter() {
            let value = decode_header(value);
            match name.to_ascii_lowercase().as_str() {
                "from" => message.from = Some(EmailAddress::parse(&value)),
                "reply-to" => message.reply_to = Some(EmailAddress::parse(&value)),
                "to" => message.to.extend(EmailAddress::parse_list(&value)),
                "subject" => message.subject = value,
                "date" => {
                    message.datetime = date::parse(&value);
                    if message.datetime.is_none() {
                        tracing::debug!(date = %value, "Unparsable Date header");
                    }
                }
                "message-id" => message.message_id = Some(value),
                "return-path" => message.return_path = Some(value),
                "envelope-to" => message.envelope_to = Some(value),
                "content-type" => message.content_type = Some(value),
                "received" => message.received.push(value),
                _ => message.other_headers.push((name.to_string(), value)),
            }
        }

        collect_parts(entity, &mut message.contents, &mut message.attachments);
        message
    }

    /// Creates an outbound message.
    #[must_use]
    pub fn compose(
        from: &str,
        to: &[&str],
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: Some(EmailAddress::parse(from)),
            to: to.iter().map(|addr| EmailAddress::parse(addr)).collect(),
            subject: subject.into(),
            content_type: Some("text/plain; charset=utf-8".to_string()),
            contents: vec![body.into()],
            ..Self::default()
        }
    }

    /// Where the message lives, `None` for composed messages.
    #[must_use]
    pub const fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Returns true if the message has been read.
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.flags.contains(SEEN)
    }

    /// Returns true if the message has been answered.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.flags.contains(ANSWERED)
    }

    /// Returns true if the message is flagged.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.flags.contains(FLAGGED)
    }

    /// Returns true if the message is marked for deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(DELETED)
    }

    /// Looks up an attribute by name for filter evaluation.
    ///
    /// Names outside the fixed attribute set are matched case-insensitively
    /// against the other headers. Returns `None` if the attribute is unknown
    /// or absent from this message.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        let value = match name {
            "from_address" => self.from.as_ref()?.address.clone(),
            "from_name" => self.from.as_ref()?.name.clone(),
            "reply_to_address" => self.reply_to.as_ref()?.address.clone(),
            "reply_to_name" => self.reply_to.as_ref()?.name.clone(),
            "to_address" => self.to.first()?.address.clone(),
            "to_name" => self.to.first()?.name.clone(),
            "subject" => self.subject.clone(),
            "date" => self.datetime?.format("%Y-%m-%d").to_string(),
            "time" => self.datetime?.format("%H:%M:%S").to_string(),
            "timezone" => date::timezone_label(*self.datetime?.offset()),
            "message_id" => self.message_id.clone()?,
            "return_path" => self.return_path.clone()?,
            "envelope_to" => self.envelope_to.clone()?,
            "content_type" => self.content_type.clone()?,
            "received" => self.received.join("\n"),
            "contents" => self.contents.join("\n"),
            "flags" => self.flags.iter().cloned().collect::<Vec<_>>().join(" "),
            "is_read" => self.is_read().to_string(),
            "is_answered" => self.is_answered().to_string(),
            "is_flagged" => self.is_flagged().to_string(),
            "is_deleted" => self.is_deleted().to_string(),
            "folder" => self.origin.as_ref()?.folder.clone(),
            "connection" => self.origin.as_ref()?.connection.clone(),
            other => {
                let values: Vec<&str> = self
                    .other_headers
                    .iter()
                    .filter(|(key, _)| key.eq_ignore_ascii_case(other))
                    .map(|(_, value)| value.as_str())
                    .collect();
                if values.is_empty() {
                    return None;
                }
                values.join("\n")
            }
        };
        Some(value)
    }

    /// Renders every header on its own line, addresses and names apart,
    /// followed by the text parts between rulers.
    #[must_use]
    pub fn render_complete(&self) -> String {
        let mut text = String::new();
        let (from_address, from_name) = address_parts(self.from.as_ref());
        let (reply_address, reply_name) = address_parts(self.reply_to.as_ref());
        let (to_address, to_name) = address_parts(self.to.first());
        let _ = writeln!(text, "From:     {from_address}");
        let _ = writeln!(text, "          {from_name}");
        let _ = writeln!(text, "Reply-To: {reply_address}");
        let _ = writeln!(text, "          {reply_name}");
        let _ = writeln!(text, "To:       {to_address}");
        let _ = writeln!(text, "          {to_name}");
        let _ = writeln!(text, "Subject:  {}", self.subject);
        match self.datetime {
            Some(datetime) => {
                let local = datetime.with_timezone(&Local);
                let _ = writeln!(text, "Date:     {}", datetime.format("%Y-%m-%d"));
                let _ = writeln!(text, "Time:     {}", datetime.format("%H:%M:%S"));
                let _ = writeln!(text, "Timezone: {}", date::timezone_label(*datetime.offset()));
                let _ = writeln!(text, "Locally:  {}", local.format("%Y-%m-%d"));
                let _ = writeln!(text, "          {}", local.format("%H:%M:%S"));
            }
            None => text.push_str("Date:     \nTime:     \nTimezone: \nLocally:  \n          \n"),
        }

        text.push('\n');
        if self.contents.len() > 1 {
            let _ = writeln!(text, "Contents (multipart, {} parts):", self.contents.len());
        } else {
            text.push_str("Contents:\n");
        }
        let ruler = "=".repeat(80);
        let _ = writeln!(text, "{ruler}");
        for (index, part) in self.contents.iter().enumerate() {
            if index > 0 {
                let _ = writeln!(text, "{ruler}");
            }
            text.push_str(part);
            if !part.ends_with('\n') {
                text.push('\n');
            }
        }
        text.push_str(&ruler);
        text
    }

    /// Serializes the message for submission.
    #[must_use]
    pub fn to_rfc5322(&self) -> Vec<u8> {
        let mut message = String::new();

        if let Some(from) = &self.from {
            let _ = writeln!(message, "From: {}\r", encode_address(from));
        }
        if let Some(reply_to) = &self.reply_to {
            let _ = writeln!(message, "Reply-To: {}\r", encode_address(reply_to));
        }
        if !self.to.is_empty() {
            let to: Vec<String> = self.to.iter().map(encode_address).collect();
            let _ = writeln!(message, "To: {}\r", to.join(", "));
        }
        let _ = writeln!(message, "Subject: {}\r", encode_rfc2047(&self.subject));
        if let Some(datetime) = &self.datetime {
            let _ = writeln!(message, "Date: {}\r", datetime.to_rfc2822());
        }
        if let Some(message_id) = &self.message_id {
            let _ = writeln!(message, "Message-ID: {message_id}\r");
        }
        message.push_str("MIME-Version: 1.0\r\n");
        message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        message.push_str("Content-Transfer-Encoding: 8bit\r\n");
        message.push_str("\r\n");
        message.push_str(&self.contents.join("\r\n"));

        message.into_bytes()
    }
}

/// Compact header summary: one line each for sender, reply address,
/// first recipient, subject and date.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = [
            ("From:    ", self.from.as_ref()),
            ("Reply-To:", self.reply_to.as_ref()),
            ("To:      ", self.to.first()),
        ];
        for (label, address) in lines {
            let (address, name) = address_parts(address);
            writeln!(f, "{}", format!("{label} {address} {name}").trim_end())?;
        }
        writeln!(f, "Subject:  {}", self.subject)?;
        match self.datetime {
            Some(datetime) => write!(
                f,
                "Datetime: {} {}",
                datetime.format("%Y-%m-%d %H:%M:%S"),
                date::timezone_label(*datetime.offset())
            ),
            None => f.write_str("Datetime:"),
        }
    }
}

fn address_parts(address: Option<&EmailAddress>) -> (&str, &str) {
    address.map_or(("", ""), |address| (address.address.as_str(), address.name.as_str()))
}

fn encode_address(address: &EmailAddress) -> String {
    if address.name.is_empty() {
        address.address.clone()
    } else {
        format!("{} <{}>", encode_rfc2047(&address.name), address.address)
    }
}

/// Decodes encoded words, reinterpreting undecodable charsets as UTF-8.
fn decode_header(value: &str) -> String {
    decode_rfc2047(value).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Header charset failed, decoding as UTF-8");
        decode_rfc2047_lossy(value)
    })
}

/// Flattens the MIME tree: `alternative` keeps its last part, `related` its
/// first part, any other multipart every part.
fn collect_parts(entity: &Entity, contents: &mut Vec<String>, attachments: &mut Vec<Attachment>) {
    let content_type = entity.content_type();
    match &entity.body {
        Body::Multipart(parts) => {
            let kept: Vec<&Entity> = match content_type.sub_type.as_str() {
                "alternative" => parts.last().into_iter().collect(),
                "related" => parts.first().into_iter().collect(),
                _ => parts.iter().collect(),
            };
            for part in kept {
                collect_parts(part, contents, attachments);
            }
        }
        Body::Leaf(raw) if raw.is_empty() => {}
        Body::Leaf(raw) => {
            let mime_type = content_type.mime_type();
            if matches!(mime_type.as_str(), "text/plain" | "text/html") {
                match decode_text(entity) {
                    Some(text) => {
                        contents.push(text);
                        return;
                    }
                    None => tracing::debug!(%mime_type, "Undecodable text part kept as attachment"),
                }
            }
            attachments.push(Attachment {
                content_type: mime_type,
                filename: entity.filename(),
                data: entity.decoded_body().unwrap_or_else(|_| raw.clone()),
            });
        }
    }
}

/// Decodes with the declared charset, then as UTF-8.
fn decode_text(entity: &Entity) -> Option<String> {
    entity.decode_text().ok().or_else(|| {
        entity
            .decoded_body()
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(data: &str) -> Message {
        Message::from_entity(&Entity::parse(data.as_bytes()).unwrap())
    }

    #[test]
    fn test_headers() {
        let message = parse(
            "From: =?utf-8?B?SsO8cmdlbg==?= <jurgen@example.com>\r\n\
             To: a@example.com, \"B, Bee\" <b@example.com>\r\n\
             Subject: =?iso-8859-1?Q?caf=E9?=\r\n\
             Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
             Received: from a\r\n\
             Received: from b\r\n\
             X-Tag: one\r\n\
             X-Tag: two\r\n\
             \r\n\
             body\r\n",
        );

        let from = message.from.clone().unwrap();
        assert_eq!(from.name, "Jürgen");
        assert_eq!(from.address, "jurgen@example.com");
        assert_eq!(message.to.len(), 2);
        assert_eq!(message.subject, "café");
        assert_eq!(message.attribute("to_name").unwrap(), "");
        assert_eq!(message.attribute("date").unwrap(), "2003-07-01");
        assert_eq!(message.attribute("time").unwrap(), "10:52:37");
        assert_eq!(message.attribute("timezone").unwrap(), "UTC+2.0");
        assert_eq!(message.attribute("received").unwrap(), "from a\nfrom b");
        assert_eq!(message.attribute("x-tag").unwrap(), "one\ntwo");
        assert_eq!(message.other_headers.len(), 2);
        assert_eq!(message.contents, vec!["body\r\n".to_string()]);
    }

    #[test]
    fn test_unknown_charset_falls_back() {
        let message = parse("Subject: =?x-unknown?Q?hello?=\r\n\r\n");
        assert_eq!(message.subject, "hello");
    }

    #[test]
    fn test_unknown_attribute_is_none() {
        let message = parse("Subject: hi\r\n\r\n");
        assert!(message.attribute("no_such_thing").is_none());
        assert!(message.attribute("from_address").is_none());
        assert!(message.attribute("folder").is_none());
        assert_eq!(message.attribute("is_read").unwrap(), "false");
    }

    #[test]
    fn test_alternative_keeps_last_part() {
        let message = parse(
            "Content-Type: multipart/alternative; boundary=XX\r\n\r\n\
             --XX\r\nContent-Type: text/plain\r\n\r\nplain\r\n\
             --XX\r\nContent-Type: text/html\r\n\r\n<p>html</p>\r\n\
             --XX--\r\n",
        );
        assert_eq!(message.contents.len(), 1);
        assert!(message.contents[0].contains("<p>html</p>"));
    }

    #[test]
    fn test_related_keeps_first_part() {
        let message = parse(
            "Content-Type: multipart/related; boundary=RR\r\n\r\n\
             --RR\r\nContent-Type: text/html\r\n\r\n<img src=cid:1>\r\n\
             --RR\r\nContent-Type: image/png\r\nContent-Transfer-Encoding: base64\r\n\r\niVBORw==\r\n\
             --RR--\r\n",
        );
        assert_eq!(message.contents.len(), 1);
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_mixed_collects_attachments() {
        let message = parse(
            "Content-Type: multipart/mixed; boundary=MM\r\n\r\n\
             --MM\r\nContent-Type: text/plain\r\n\r\nsee attached\r\n\
             --MM\r\nContent-Type: application/pdf\r\n\
             Content-Disposition: attachment; filename=\"a.pdf\"\r\n\
             Content-Transfer-Encoding: base64\r\n\r\nJVBERg==\r\n\
             --MM--\r\n",
        );
        assert_eq!(message.contents.len(), 1);
        assert_eq!(message.attachments.len(), 1);
        let attachment = &message.attachments[0];
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.filename.as_deref(), Some("a.pdf"));
        assert_eq!(attachment.data, b"%PDF".to_vec());
    }

    #[test]
    fn test_flag_projections() {
        let raw = RawMessage {
            id: MessageId(7),
            flags: ["Seen", "Flagged"].into_iter().map(String::from).collect(),
            internal_date: None,
            data: b"Subject: x\r\n\r\n".to_vec(),
        };
        let message = Message::from_raw(&raw, "work", "INBOX");

        assert!(message.is_read());
        assert!(message.is_flagged());
        assert!(!message.is_answered());
        assert!(!message.is_deleted());
        assert_eq!(message.attribute("flags").unwrap(), "Flagged Seen");
        assert_eq!(message.attribute("folder").unwrap(), "INBOX");
        assert_eq!(message.origin().unwrap().id, MessageId(7));
    }

    #[test]
    fn test_display_is_compact_headers() {
        let message = parse(
            "From: Ann <ann@example.com>\r\n\
             To: bob@example.com\r\n\
             Subject: Lunch\r\n\
             Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
             \r\n\
             body\r\n",
        );

        assert_eq!(
            message.to_string(),
            "From:     ann@example.com Ann\n\
             Reply-To:\n\
             To:       bob@example.com\n\
             Subject:  Lunch\n\
             Datetime: 2003-07-01 10:52:37 UTC+2.0"
        );
        assert_eq!(Message::default().to_string().lines().last(), Some("Datetime:"));
    }

    #[test]
    fn test_render_complete_lists_parts() {
        let message = parse(
            "From: Ann <ann@example.com>\r\n\
             Subject: Report\r\n\
             Content-Type: multipart/mixed; boundary=MM\r\n\r\n\
             --MM\r\nContent-Type: text/plain\r\n\r\nfirst\r\n\
             --MM\r\nContent-Type: text/plain\r\n\r\nsecond\r\n\
             --MM--\r\n",
        );
        let text = message.render_complete();
        let ruler = "=".repeat(80);

        assert!(text.starts_with("From:     ann@example.com\n          Ann\n"));
        assert!(text.contains("Subject:  Report\n"));
        assert!(text.contains("\n\nContents (multipart, 2 parts):\n"));
        assert_eq!(text.matches(ruler.as_str()).count(), 3);
        assert!(text.ends_with(&ruler));

        let single = Message::compose("me@example.com", &[], "Hi", "Hello");
        assert!(single.render_complete().contains("\nContents:\n"));
    }

    #[test]
    fn test_compose_has_no_origin() {
        let message = Message::compose("Me <me@example.com>", &["a@example.com"], "Hi", "Hello");
        assert!(message.origin().is_none());
        let text = String::from_utf8(message.to_rfc5322()).unwrap();
        assert!(
            text.starts_with("From: Me <me@example.com>\r\nTo: a@example.com\r\nSubject: Hi\r\n")
        );
        assert!(text.ends_with("\r\n\r\nHello"));
    }
}
