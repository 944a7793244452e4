//! Error types for MIME operations.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid transfer or header encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Charset label not known to the decoder.
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),

    /// Bytes are not valid in the declared charset.
    #[error("Malformed {0} text")]
    MalformedText(String),

    /// Multipart nesting exceeds the supported depth.
    #[error("Multipart nesting deeper than {0} levels")]
    TooDeep(usize),
}
