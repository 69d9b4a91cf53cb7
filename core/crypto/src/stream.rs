//! Keystream ciphers for protected values.
//!
//! Protected strings and binaries inside a vault document are XOR-ed with a
//! single keystream that is consumed sequentially across the whole document.
//! The cipher must therefore be advanced in exactly the order in which the
//! values were encrypted.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use salsa20::Salsa20;
use sha2::{Digest, Sha256, Sha512};

use strongroom_common::{Error, Result};

/// Fixed nonce of the legacy Salsa20 inner stream.
pub const SALSA20_NONCE: [u8; 8] = [0xE8, 0x30, 0x09, 0x4B, 0x97, 0x20, 0x5D, 0x2A];

/// Stateful generator of pseudorandom bytes.
pub trait KeystreamCipher {
    /// XOR `data` with the next `data.len()` keystream bytes, in place.
    ///
    /// # Errors
    /// - Returns error if the keystream is exhausted
    fn apply_keystream(&mut self, data: &mut [u8]) -> Result<()>;
}

/// ChaCha20 inner stream (format version 4).
///
/// The stream key is SHA-512 of the supplied key: bytes 0..32 are the
/// cipher key and bytes 32..44 the nonce.
pub struct ChaCha20Stream {
    cipher: ChaCha20,
}

impl ChaCha20Stream {
    /// Initialise from the protected stream key.
    ///
    /// # Errors
    /// - Returns error if `key` is empty
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::InvalidInput(
                "Protected stream key cannot be empty".to_string(),
            ));
        }

        let hash = Sha512::digest(key);
        let cipher = ChaCha20::new_from_slices(&hash[..32], &hash[32..44])
            .map_err(|e| Error::Crypto(format!("Invalid ChaCha20 key: {}", e)))?;
        Ok(Self { cipher })
    }
}

impl KeystreamCipher for ChaCha20Stream {
    fn apply_keystream(&mut self, data: &mut [u8]) -> Result<()> {
        self.cipher
            .try_apply_keystream(data)
            .map_err(|e| Error::Crypto(format!("ChaCha20 keystream failure: {}", e)))
    }
}

/// Salsa20 inner stream (legacy format version 3).
pub struct Salsa20Stream {
    cipher: Salsa20,
}

impl Salsa20Stream {
    /// Initialise from the protected stream key.
    ///
    /// # Errors
    /// - Returns error if `key` is empty
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::InvalidInput(
                "Protected stream key cannot be empty".to_string(),
            ));
        }

        let hash = Sha256::digest(key);
        let cipher = Salsa20::new_from_slices(&hash, &SALSA20_NONCE)
            .map_err(|e| Error::Crypto(format!("Invalid Salsa20 key: {}", e)))?;
        Ok(Self { cipher })
    }
}

impl KeystreamCipher for Salsa20Stream {
    fn apply_keystream(&mut self, data: &mut [u8]) -> Result<()> {
        self.cipher
            .try_apply_keystream(data)
            .map_err(|e| Error::Crypto(format!("Salsa20 keystream failure: {}", e)))
    }
}

/// Inner stream algorithm identifiers as stored in the envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedStreamAlgo {
    Salsa20 = 2,
    ChaCha20 = 3,
}

impl ProtectedStreamAlgo {
    /// Map a header id to an algorithm.
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            2 => Some(Self::Salsa20),
            3 => Some(Self::ChaCha20),
            _ => None,
        }
    }

    /// Construct the keystream for this algorithm.
    pub fn build(self, key: &[u8]) -> Result<Box<dyn KeystreamCipher>> {
        Ok(match self {
            Self::Salsa20 => Box::new(Salsa20Stream::new(key)?),
            Self::ChaCha20 => Box::new(ChaCha20Stream::new(key)?),
        })
    }
}
