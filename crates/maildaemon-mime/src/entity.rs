//! MIME entity tree.

use std::fmt;

use crate::content_type::{ContentType, split_parameters};
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable, decode_rfc2047_lossy};
use crate::error::{Error, Result};
use crate::header::Headers;

/// Maximum multipart nesting accepted by [`Entity::parse`].
pub const MAX_DEPTH: usize = 32;

/// Content transfer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses a `Content-Transfer-Encoding` value. Unknown values are 7bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }

    /// Decodes a body in this transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a Base64 body is invalid.
    pub fn decode(self, body: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(body),
            Self::QuotedPrintable => Ok(decode_quoted_printable(body)),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(body.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Binary => "binary",
        })
    }
}

/// Body of a MIME entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Raw, still transfer-encoded bytes.
    Leaf(Vec<u8>),
    /// Child entities of a multipart body, in order.
    Multipart(Vec<Entity>),
}

/// A MIME entity: headers plus a leaf or multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Entity headers.
    pub headers: Headers,
    /// Entity body.
    pub body: Body,
}

impl Entity {
    /// Parses a message or body part.
    ///
    /// Input without a blank line is treated as a header block with an empty
    /// body, which is what a header-only fetch returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooDeep`] if multipart nesting exceeds [`MAX_DEPTH`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_at(data, 0)
    }

    fn parse_at(data: &[u8], depth: usize) -> Result<Self> {
        if depth > MAX_DEPTH {
            return Err(Error::TooDeep(MAX_DEPTH));
        }

        let (head, body) = split_head(data);
        let headers = Headers::parse(&String::from_utf8_lossy(head));

        let content_type = content_type_of(&headers);
        let body = match content_type.boundary() {
            Some(boundary) if content_type.is_multipart() => {
                let children = split_multipart(body, boundary)
                    .into_iter()
                    .map(|part| Self::parse_at(part, depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Body::Multipart(children)
            }
            _ => Body::Leaf(body.to_vec()),
        };

        Ok(Self { headers, body })
    }

    /// Returns the content type, defaulting to `text/plain; charset=us-ascii`
    /// when the header is absent or unparsable.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        content_type_of(&self.headers)
    }

    /// Returns the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns the leaf body with the transfer encoding removed. Multipart
    /// entities have no leaf body and yield an empty vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer encoding cannot be reversed.
    pub fn decoded_body(&self) -> Result<Vec<u8>> {
        match &self.body {
            Body::Leaf(raw) => self.transfer_encoding().decode(raw),
            Body::Multipart(_) => Ok(Vec::new()),
        }
    }

    /// Decodes the leaf body as text in its declared charset (UTF-8 when
    /// none is declared).
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer encoding or charset decoding fails.
    pub fn decode_text(&self) -> Result<String> {
        let content_type = self.content_type();
        let charset = content_type.charset().unwrap_or("utf-8");
        decode_charset(&self.decoded_body()?, charset)
    }

    /// Returns the attachment filename from `Content-Disposition`, falling
    /// back to the `name` content type parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let from_disposition = self.headers.get("content-disposition").and_then(|value| {
            split_parameters(value).into_iter().skip(1).find_map(|param| {
                let (key, value) = param.split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("filename")
                    .then(|| value.trim().trim_matches('"').to_string())
            })
        });

        from_disposition
            .or_else(|| self.content_type().name().map(str::to_string))
            .map(|name| decode_rfc2047_lossy(&name))
    }

    /// Returns true if the body holds child entities.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.body, Body::Multipart(_))
    }
}

fn content_type_of(headers: &Headers) -> ContentType {
    headers
        .get("content-type")
        .and_then(|value| ContentType::parse(value).ok())
        .unwrap_or_else(ContentType::default_text)
}

/// Splits an entity at the first empty line.
fn split_head(data: &[u8]) -> (&[u8], &[u8]) {
    if data.starts_with(b"\r\n") {
        return (&[], &data[2..]);
    }
    if data.starts_with(b"\n") {
        return (&[], &data[1..]);
    }

    let crlf = find(data, b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = find(data, b"\n\n").map(|i| (i, i + 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((head_end, body_start)) => (&data[..head_end], &data[body_start..]),
        None => (data, &[]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits a multipart body into its parts. Preamble and epilogue are
/// dropped; an unterminated final part runs to the end of the body.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let next = (line_end + 1).min(body.len());
        let line = body[pos..line_end].strip_suffix(b"\r").unwrap_or(&body[pos..line_end]);

        if let Some(rest) = line.strip_prefix(delimiter.as_bytes()) {
            let closing = rest.starts_with(b"--");
            if closing || rest.iter().all(u8::is_ascii_whitespace) {
                if let Some(start) = part_start {
                    parts.push(strip_line_break(&body[start..pos]));
                }
                if closing {
                    return parts;
                }
                part_start = Some(next);
            }
        }

        pos = next;
    }

    if let Some(start) = part_start.filter(|&s| s < body.len()) {
        parts.push(&body[start..]);
    }

    parts
}

/// Removes the line break that belongs to the following delimiter.
fn strip_line_break(part: &[u8]) -> &[u8] {
    part.strip_suffix(b"\r\n")
        .or_else(|| part.strip_suffix(b"\n"))
        .unwrap_or(part)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MULTIPART: &[u8] = b"From: a@example.com\r\n\
Subject: Parts\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
preamble\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Caf=E9\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>Cafe</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0=\r\n\
--outer--\r\n\
epilogue\r\n";

    #[test]
    fn test_parse_simple() {
        let entity = Entity::parse(b"Subject: Hi\r\n\r\nbody\r\n").unwrap();
        assert_eq!(entity.headers.get("subject"), Some("Hi"));
        assert_eq!(entity.body, Body::Leaf(b"body\r\n".to_vec()));
        assert_eq!(entity.content_type().mime_type(), "text/plain");
    }

    #[test]
    fn test_parse_headers_only() {
        let entity = Entity::parse(b"Subject: Hi\r\nFrom: a@example.com\r\n").unwrap();
        assert_eq!(entity.headers.len(), 2);
        assert_eq!(entity.body, Body::Leaf(Vec::new()));
    }

    #[test]
    fn test_parse_lf_only() {
        let entity = Entity::parse(b"Subject: Hi\n\nbody").unwrap();
        assert_eq!(entity.headers.get("Subject"), Some("Hi"));
        assert_eq!(entity.decode_text().unwrap(), "body");
    }

    #[test]
    fn test_parse_nested_multipart() {
        let entity = Entity::parse(MULTIPART).unwrap();
        let Body::Multipart(parts) = &entity.body else {
            panic!("expected multipart");
        };
        assert_eq!(parts.len(), 2);
        assert!(parts[0].is_multipart());

        let Body::Multipart(alternatives) = &parts[0].body else {
            panic!("expected alternative");
        };
        assert_eq!(alternatives.len(), 2);
        assert_eq!(alternatives[0].decode_text().unwrap(), "Café");
        assert_eq!(alternatives[1].decode_text().unwrap(), "<p>Cafe</p>");

        assert_eq!(parts[1].filename().as_deref(), Some("report.pdf"));
        assert_eq!(parts[1].decoded_body().unwrap(), b"%PDF-");
    }

    #[test]
    fn test_filename_from_disposition() {
        let raw = b"Content-Type: application/octet-stream; name=fallback.bin\r\n\
Content-Disposition: attachment; filename=\"=?utf-8?Q?r=C3=A9sum=C3=A9.txt?=\"\r\n\r\nx";
        let entity = Entity::parse(raw).unwrap();
        assert_eq!(entity.filename().as_deref(), Some("résumé.txt"));
    }

    #[test]
    fn test_invalid_content_type_defaults() {
        let entity = Entity::parse(b"Content-Type: garbage\r\n\r\nhello").unwrap();
        assert_eq!(entity.content_type(), ContentType::default_text());
        assert_eq!(entity.decode_text().unwrap(), "hello");
    }

    #[test]
    fn test_unterminated_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\r\n--b\r\n\r\nonly part";
        let entity = Entity::parse(raw).unwrap();
        let Body::Multipart(parts) = entity.body else {
            panic!("expected multipart");
        };
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, Body::Leaf(b"only part".to_vec()));
    }

    #[test]
    fn test_too_deep() {
        let mut raw = Vec::new();
        for level in 0..=MAX_DEPTH + 1 {
            raw.extend_from_slice(
                format!("Content-Type: multipart/mixed; boundary=b{level}\r\n\r\n--b{level}\r\n")
                    .as_bytes(),
            );
        }
        assert!(matches!(Entity::parse(&raw), Err(Error::TooDeep(_))));
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(TransferEncoding::parse("x-unknown"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::QuotedPrintable.to_string(), "quoted-printable");
    }
}
