//! Reply assembly.
//!
//! A reply is one or more lines sharing a three-digit code. Every line but
//! the last has `-` after the code; the last has a space or nothing.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Collects the lines of one reply as they arrive.
#[derive(Debug, Default)]
pub struct ReplyAssembler {
    code: Option<u16>,
    text: Vec<String>,
}

impl ReplyAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line, without its line ending. Returns the reply once its
    /// last line has been fed; the assembler is then empty again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for a line without a numeric code, with
    /// an unexpected separator, or with a code differing from the first
    /// line's.
    pub fn push(&mut self, line: &str) -> Result<Option<Reply>> {
        let code = line
            .get(..3)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u16>().ok())
            .ok_or_else(|| Error::Protocol(format!("Invalid reply line: {line}")))?;

        match self.code {
            Some(first) if first != code => {
                return Err(Error::Protocol(format!(
                    "Reply code changed from {first} mid-reply: {line}"
                )));
            }
            _ => self.code = Some(code),
        }

        let last = match line.as_bytes().get(3) {
            None | Some(b' ') => true,
            Some(b'-') => false,
            Some(_) => return Err(Error::Protocol(format!("Invalid reply line: {line}"))),
        };
        self.text.push(line.get(4..).unwrap_or_default().to_string());

        if !last {
            return Ok(None);
        }
        self.code = None;
        Ok(Some(Reply::new(
            ReplyCode::new(code),
            std::mem::take(&mut self.text),
        )))
    }
}
