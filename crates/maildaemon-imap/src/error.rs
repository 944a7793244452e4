//! Error types for the IMAP client.

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Response could not be parsed.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Server returned NO.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Operation is not valid in the current session state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A state transition the server refused.
///
/// Carries the client back in the state the protocol leaves it in, so a
/// failed SELECT or LOGIN does not cost the connection.
#[derive(Debug)]
pub struct Rejected<C> {
    /// The client, still usable.
    pub client: C,
    /// Why the transition failed.
    pub error: Error,
}

impl<C> From<Rejected<C>> for Error {
    fn from(rejected: Rejected<C>) -> Self {
        rejected.error
    }
}
