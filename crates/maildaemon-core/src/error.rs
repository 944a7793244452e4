//! Error types for the engine.

use thiserror::Error;

/// Errors that can occur in the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Establishing or authenticating a session failed.
    #[error("{connection}: connect failed: {reason}")]
    Connect {
        /// Connection name.
        connection: String,
        /// What went wrong.
        reason: String,
    },

    /// The server did not acknowledge the end of the session.
    #[error("{connection}: disconnect failed: {reason}")]
    Disconnect {
        /// Connection name.
        connection: String,
        /// What went wrong.
        reason: String,
    },

    /// A protocol command returned a negative status.
    #[error("{op}({args}) failed: {reason}")]
    OperationFailed {
        /// Operation name.
        op: String,
        /// Operation arguments, for the log.
        args: String,
        /// Server response or local refusal.
        reason: String,
    },

    /// Socket-level failure, including timeouts.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid connection or filter configuration.
    #[error("{section}: {reason}")]
    Construction {
        /// Offending configuration section, e.g. `filter: spam`.
        section: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Header or body decoding failed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The connection has no such capability.
    #[error("{connection}: {op} is not supported")]
    NotSupported {
        /// Connection name.
        connection: String,
        /// Operation name.
        op: String,
    },

    /// Credentials could not be obtained.
    #[error("Credential error: {0}")]
    Credential(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn operation(op: &str, args: impl ToString, reason: impl ToString) -> Self {
        Self::OperationFailed {
            op: op.to_string(),
            args: args.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn construction(section: impl ToString, reason: impl ToString) -> Self {
        Self::Construction {
            section: section.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn not_supported(connection: &str, op: &str) -> Self {
        Self::NotSupported {
            connection: connection.to_string(),
            op: op.to_string(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
