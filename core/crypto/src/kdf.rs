//! Key derivation.
//!
//! The composite key is turned into the final key by a deliberately
//! expensive, pluggable transform. Argon2 is the provided strategy.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::keys::{MasterKey, RawKey, KEY_LENGTH};
use strongroom_common::{Error, Result};

/// A deterministic, intentionally slow key transform.
///
/// Transforms run to completion or fail; there is no cancellation. Callers
/// that must stay responsive can move the call onto a worker thread.
pub trait Kdf: Send + Sync {
    /// Derive the final key from the composite raw key.
    fn transform(&self, raw: &RawKey) -> Result<MasterKey>;

    /// The per-vault seed (salt) this transform uses.
    fn seed(&self) -> &[u8];
}

/// Parameters for Argon2 key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Create parameters suitable for interactive use.
    ///
    /// Targets roughly 0.5-1 second of derivation time on desktop hardware.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Create parameters suitable for sensitive data.
    pub fn sensitive() -> Self {
        Self {
            memory_cost: 262144, // 256 MiB
            time_cost: 4,
            parallelism: 4,
        }
    }

    /// Create moderate parameters for mobile devices.
    pub fn moderate() -> Self {
        Self {
            memory_cost: 32768, // 32 MiB
            time_cost: 3,
            parallelism: 2,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Argon2 flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Argon2Variant {
    Argon2d,
    #[default]
    Argon2id,
}

/// Salt for key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    /// Generate a random salt.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut salt = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Argon2 (version 0x13) key transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argon2Kdf {
    pub salt: Salt,
    pub params: KdfParams,
    pub variant: Argon2Variant,
}

impl Argon2Kdf {
    /// Create an Argon2id transform.
    pub fn new(salt: Salt, params: KdfParams) -> Self {
        Self {
            salt,
            params,
            variant: Argon2Variant::Argon2id,
        }
    }

    /// Switch the Argon2 flavour.
    pub fn with_variant(mut self, variant: Argon2Variant) -> Self {
        self.variant = variant;
        self
    }
}

impl Kdf for Argon2Kdf {
    fn transform(&self, raw: &RawKey) -> Result<MasterKey> {
        let argon2_params = Params::new(
            self.params.memory_cost,
            self.params.time_cost,
            self.params.parallelism,
            Some(KEY_LENGTH),
        )
        .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

        let algorithm = match self.variant {
            Argon2Variant::Argon2d => Algorithm::Argon2d,
            Argon2Variant::Argon2id => Algorithm::Argon2id,
        };
        let argon2 = Argon2::new(algorithm, Version::V0x13, argon2_params);

        let mut key_bytes = [0u8; KEY_LENGTH];
        argon2
            .hash_password_into(raw.as_bytes(), self.salt.as_bytes(), &mut key_bytes)
            .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

        Ok(MasterKey::from_bytes(key_bytes))
    }

    fn seed(&self) -> &[u8] {
        self.salt.as_bytes()
    }
}
