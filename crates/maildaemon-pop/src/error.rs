//! Error types for POP3 operations.

use thiserror::Error;

/// Errors that can occur during POP3 operations.
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

    /// Server answered `-ERR`.
    #[error("Server returned -ERR: {0}")]
    Err(String),

    /// The greeting carried no APOP timestamp.
    #[error("Server does not offer APOP")]
    ApopUnavailable,

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A login the server refused.
///
/// The client stays in the AUTHORIZATION state, so another mechanism can be
/// tried on the same connection.
#[derive(Debug)]
pub struct Rejected<C> {
    /// The client, still usable.
    pub client: C,
    /// Why the login failed.
    pub error: Error,
}

impl<C> From<Rejected<C>> for Error {
    fn from(rejected: Rejected<C>) -> Self {
        rejected.error
    }
}
