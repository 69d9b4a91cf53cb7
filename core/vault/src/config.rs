//! Decoder configuration.

use serde::{Deserialize, Serialize};

use strongroom_common::{Error, ParseMode, Result};

/// Highest built-in icon number.
pub const MAX_STANDARD_ICON: u32 = 68;

/// Options controlling how a vault document is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Repair (lenient) or reject (strict) recoverable anomalies.
    pub mode: ParseMode,
    /// Group icon numbers above this are clamped to it.
    pub max_icon_id: u32,
}

impl DecoderConfig {
    /// Lenient configuration.
    pub fn lenient() -> Self {
        Self::default()
    }

    /// Strict configuration.
    pub fn strict() -> Self {
        Self {
            mode: ParseMode::Strict,
            ..Self::default()
        }
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Serialize to bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            mode: ParseMode::Lenient,
            max_icon_id: MAX_STANDARD_ICON,
        }
    }
}
