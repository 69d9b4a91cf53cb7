//! Common types used throughout Strongroom.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Parse policy for recoverable anomalies in a vault document.
///
/// Lenient mode repairs what it can (random UUIDs for missing ones, the
/// current time for unreadable dates, unset colors). Strict mode rejects
/// the same conditions with a content error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    #[default]
    Lenient,
    Strict,
}

impl ParseMode {
    /// Check if this is strict mode.
    pub fn is_strict(self) -> bool {
        self == ParseMode::Strict
    }
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Default, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Create an empty value.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}
