//! Framed I/O for the IMAP protocol.
//!
//! A response is one CRLF-terminated line, extended by every `{n}` literal
//! announced at the end of a line: the `n` bytes and the line that follows
//! belong to the same response.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::types::Tag;
use crate::{Error, Result};

const BUFFER_SIZE: usize = 8192;

/// Longest line accepted, literals excluded.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered, literal-aware IMAP stream.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(BUFFER_SIZE),
        }
    }

    /// Reads one complete response, literals included.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(len) = literal_length(&line) else {
                break;
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let start = response.len();
            response.resize(start + len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
        }

        tracing::trace!(len = response.len(), "IMAP response read");
        Ok(response)
    }

    /// Reads responses up to and including the tagged completion of `tag`.
    ///
    /// Untagged data that arrives before the completion (including
    /// unsolicited EXISTS or EXPUNGE) is returned along with it.
    pub async fn read_until_tagged(&mut self, tag: &Tag) -> Result<Vec<Vec<u8>>> {
        let mut responses = Vec::new();
        loop {
            let response = self.read_response().await?;
            let done = is_tagged_with(&response, tag);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            // A CR may end one read and its LF start the next.
            let carried_cr = line.last() == Some(&b'\r') && buf[0] == b'\n';
            if carried_cr {
                line.push(b'\n');
                self.reader.consume(1);
                return Ok(line);
            }

            if let Some(pos) = find_crlf(buf) {
                line.extend_from_slice(&buf[..pos + 2]);
                self.reader.consume(pos + 2);
                return Ok(line);
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    /// Writes and flushes a serialized command.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Writes and flushes raw bytes, such as literal data.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Returns the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }
}

fn is_tagged_with(response: &[u8], tag: &Tag) -> bool {
    let tag = tag.as_str().as_bytes();
    response.starts_with(tag) && response.get(tag.len()) == Some(&b' ')
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses `{n}` or `{n+}` at the end of a CRLF-terminated line.
fn literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
