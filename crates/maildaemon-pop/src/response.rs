//! Sans-I/O helpers for POP3 replies.

use md5::{Digest, Md5};

use crate::{Error, Result};

/// Status indicator of a reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// `+OK` and the rest of the line.
    Ok(String),
    /// `-ERR` and the rest of the line.
    Err(String),
}

/// Parses a status line (without its CRLF).
///
/// # Errors
///
/// Returns an error if the line starts with neither `+OK` nor `-ERR`.
pub fn parse_status(line: &str) -> Result<Status> {
    if let Some(rest) = line.strip_prefix("+OK") {
        Ok(Status::Ok(rest.trim_start().to_string()))
    } else if let Some(rest) = line.strip_prefix("-ERR") {
        Ok(Status::Err(rest.trim_start().to_string()))
    } else {
        Err(Error::Protocol(format!("Unexpected status line: {line}")))
    }
}

/// Extracts the APOP timestamp (`<...>`, brackets included) from a greeting.
#[must_use]
pub fn apop_timestamp(greeting: &str) -> Option<&str> {
    let start = greeting.find('<')?;
    let len = greeting[start..].find('>')?;
    Some(&greeting[start..=start + len])
}

/// Computes the APOP digest: hex MD5 of the timestamp followed by the secret.
#[must_use]
pub fn apop_digest(timestamp: &str, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Parses `STAT` (`count size`).
///
/// # Errors
///
/// Returns an error if the text is not two numbers.
pub fn parse_stat(text: &str) -> Result<(u32, u64)> {
    let mut parts = text.split_whitespace();
    let count = parse_number(parts.next(), text)?;
    let size = parse_number(parts.next(), text)?;
    Ok((count, size))
}

/// Parses one scan listing (`msg size`) of LIST.
///
/// # Errors
///
/// Returns an error if the line is not two numbers.
pub fn parse_scan_listing(line: &str) -> Result<(u32, u64)> {
    parse_stat(line)
}

/// Parses one unique-id listing (`msg uid`) of UIDL.
///
/// # Errors
///
/// Returns an error if the message number or the id is missing.
pub fn parse_uid_listing(line: &str) -> Result<(u32, String)> {
    let mut parts = line.split_whitespace();
    let msg = parse_number(parts.next(), line)?;
    let uid = parts
        .next()
        .ok_or_else(|| Error::Protocol(format!("Missing unique id: {line}")))?;
    Ok((msg, uid.to_string()))
}

fn parse_number<T: std::str::FromStr>(part: Option<&str>, line: &str) -> Result<T> {
    part.and_then(|p| p.parse().ok())
        .ok_or_else(|| Error::Protocol(format!("Malformed listing: {line}")))
}

/// Removes byte-stuffing from one line of a multi-line body.
///
/// Returns `None` for the terminating `.` line.
#[must_use]
pub fn unstuff_line(line: &[u8]) -> Option<&[u8]> {
    match line {
        b"." => None,
        [b'.', rest @ ..] => Some(rest),
        _ => Some(line),
    }
}
