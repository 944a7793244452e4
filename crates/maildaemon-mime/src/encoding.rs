//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 encoded words and charset
//! conversion.

use std::borrow::Cow;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use encoding_rs::Encoding;

use crate::error::{Error, Result};

/// Base64 engine that tolerates missing or superfluous padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed. A malformed escape is kept literally, the
/// way most mail readers treat it.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        match (data.get(i + 1), data.get(i + 2)) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (Some(&hi), Some(&lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                result.push(hex_value(hi) << 4 | hex_value(lo));
                i += 3;
            }
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

const fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

/// Decodes bytes in the given charset.
///
/// # Errors
///
/// Returns [`Error::UnknownCharset`] for labels `encoding_rs` does not know
/// and [`Error::MalformedText`] if the bytes are invalid in that charset.
pub fn decode_charset(data: &[u8], charset: &str) -> Result<String> {
    let encoding = Encoding::for_label_no_replacement(charset.trim().as_bytes())
        .ok_or_else(|| Error::UnknownCharset(charset.to_string()))?;

    encoding
        .decode_without_bom_handling_and_without_replacement(data)
        .map(Cow::into_owned)
        .ok_or_else(|| Error::MalformedText(encoding.name().to_string()))
}

/// Encodes a header value using RFC 2047 if it contains non-ASCII text.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }
    format!("=?utf-8?B?{}?=", encode_base64(text.as_bytes()))
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Text outside encoded words is kept as is; whitespace between two adjacent
/// encoded words is dropped.
///
/// # Errors
///
/// Returns an error if an encoded word names an unknown charset or its
/// payload does not decode.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    decode_words(text, false)
}

/// Decodes RFC 2047 encoded words, reinterpreting the payload of any word
/// whose charset fails as UTF-8 (with replacement characters).
#[must_use]
pub fn decode_rfc2047_lossy(text: &str) -> String {
    // Lossy mode only fails on transfer-encoding errors; keep the raw text then.
    decode_words(text, true).unwrap_or_else(|_| text.to_string())
}

fn decode_words(text: &str, lossy: bool) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        if let Some((word, consumed)) = EncodedWord::parse(candidate) {
            if !(after_word && before.trim().is_empty()) {
                out.push_str(before);
            }
            out.push_str(&word.decode(lossy)?);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }
    out.push_str(rest);

    Ok(out)
}

/// A single `=?charset?encoding?text?=` token.
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: char,
    payload: &'a str,
}

impl<'a> EncodedWord<'a> {
    /// Parses an encoded word at the start of `s`, returning it with the
    /// number of bytes consumed.
    fn parse(s: &'a str) -> Option<(Self, usize)> {
        let body = s.strip_prefix("=?")?;

        let charset_end = body.find('?')?;
        let charset = &body[..charset_end];
        let after_charset = &body[charset_end + 1..];

        let encoding_end = after_charset.find('?')?;
        let mut encoding_chars = after_charset[..encoding_end].chars();
        let encoding = encoding_chars.next()?.to_ascii_uppercase();
        if encoding_chars.next().is_some() || !matches!(encoding, 'B' | 'Q') {
            return None;
        }

        let after_encoding = &after_charset[encoding_end + 1..];
        let payload_end = after_encoding.find("?=")?;
        let payload = &after_encoding[..payload_end];

        if charset.is_empty() || charset.contains(char::is_whitespace) {
            return None;
        }
        if payload.contains(char::is_whitespace) {
            return None;
        }

        // RFC 2231 language suffix: charset*lang
        let charset = charset.split('*').next().unwrap_or(charset);
        let consumed = 2 + charset_end + 1 + encoding_end + 1 + payload_end + 2;

        Some((
            Self {
                charset,
                encoding,
                payload,
            },
            consumed,
        ))
    }

    fn decode(&self, lossy: bool) -> Result<String> {
        let bytes = if self.encoding == 'B' {
            decode_base64(self.payload.as_bytes())?
        } else {
            let spaced = self.payload.replace('_', " ");
            decode_quoted_printable(spaced.as_bytes())
        };

        match decode_charset(&bytes, self.charset) {
            Ok(text) => Ok(text),
            Err(_) if lossy => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => Err(e),
        }
    }
}
