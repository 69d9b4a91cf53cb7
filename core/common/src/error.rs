//! Common error types for Strongroom.

use thiserror::Error;

/// Top-level error type for Strongroom operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The document has no recognizable root structure, or more than one.
    #[error("Structural error: {0}")]
    Structure(String),

    /// The underlying XML stream is malformed.
    #[error("XML error: {message} (at byte {position})")]
    Xml { message: String, position: u64 },

    /// A value or element in the document is invalid.
    #[error("Content error: {0}")]
    Content(String),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No usable root structure was found.
    Structural,
    /// A content error was explicitly raised while reading values.
    Content,
    /// Decryption, key derivation or challenge-response failed.
    Crypto,
    /// Anything else (I/O, configuration, bad arguments).
    Other,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Structure(_) | Error::Xml { .. } => ErrorKind::Structural,
            Error::Content(_) => ErrorKind::Content,
            Error::Crypto(_) => ErrorKind::Crypto,
            Error::Io(_) | Error::Serialization(_) | Error::InvalidInput(_) => ErrorKind::Other,
        }
    }

    /// Whether the document lacked a recognizable root structure.
    pub fn is_structural(&self) -> bool {
        self.kind() == ErrorKind::Structural
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
