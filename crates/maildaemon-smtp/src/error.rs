//! Error types for SMTP operations.

use std::io;

use crate::types::Reply;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// One or more recipients were refused; the transaction was reset.
    #[error("Recipients refused: {}", format_rejected(.0))]
    RecipientsRejected(Vec<(String, Reply)>),

    /// Protocol error (unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message larger than the server's advertised SIZE.
    #[error("Message exceeds size limit: {size} > {limit} bytes")]
    MessageTooLarge {
        /// Message size.
        size: usize,
        /// Advertised limit.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

fn format_rejected(rejected: &[(String, Reply)]) -> String {
    rejected
        .iter()
        .map(|(rcpt, reply)| format!("{rcpt} ({} {})", reply.code, reply.message_text()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Creates an SMTP error from a reply.
    #[must_use]
    pub fn from_reply(reply: &Reply) -> Self {
        Self::SmtpError {
            code: reply.code.as_u16(),
            message: reply.message_text(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
    }
}
