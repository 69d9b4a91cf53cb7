//! Key types and credential factors.
//!
//! Raw and derived keys zeroize their memory on drop. Plain key sources
//! (password, key file) expose a fixed-length digest; challenge-response
//! sources transform a seed instead of presenting a static secret.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use strongroom_common::{Error, Result};

/// Length of raw and derived keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Final key material produced by a [`crate::Kdf`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    /// Create a master key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Combined digest of all credential factors, before key derivation.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RawKey {
    key: [u8; KEY_LENGTH],
}

impl RawKey {
    /// Create a raw key from bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Constant-time equality.
    pub fn ct_eq(&self, other: &RawKey) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

impl fmt::Debug for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawKey([REDACTED])")
    }
}

/// A static credential factor with a fixed-length digest.
pub trait KeySource: Send + Sync {
    /// Digest fed into the composite key.
    fn raw_key(&self) -> [u8; KEY_LENGTH];

    /// Clone into an owned trait object.
    fn clone_box(&self) -> Box<dyn KeySource>;
}

impl Clone for Box<dyn KeySource> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A credential factor that answers a challenge, typically a hardware token.
///
/// Implementations may block on device I/O. Timeouts are their concern.
pub trait ChallengeResponseKey: Send + Sync {
    /// Answer `seed`. A missing or failing device is an error.
    fn challenge(&self, seed: &[u8]) -> Result<Vec<u8>>;
}

/// Password factor. The digest is SHA-256 of the UTF-8 password.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PasswordKey {
    digest: [u8; KEY_LENGTH],
}

impl PasswordKey {
    /// Hash `password` into a key source.
    pub fn new(password: &str) -> Self {
        let mut digest = [0u8; KEY_LENGTH];
        digest.copy_from_slice(&Sha256::digest(password.as_bytes()));
        Self { digest }
    }
}

impl KeySource for PasswordKey {
    fn raw_key(&self) -> [u8; KEY_LENGTH] {
        self.digest
    }

    fn clone_box(&self) -> Box<dyn KeySource> {
        Box::new(self.clone())
    }
}

impl fmt::Debug for PasswordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PasswordKey([REDACTED])")
    }
}

/// Key file factor.
///
/// Contents of exactly 32 bytes are used as-is, 64 hex characters are
/// decoded, and anything else is hashed with SHA-256.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FileKey {
    digest: [u8; KEY_LENGTH],
}

impl FileKey {
    /// Build a key source from key file contents.
    ///
    /// # Errors
    /// - Returns error if the contents are empty
    pub fn from_contents(contents: &[u8]) -> Result<Self> {
        if contents.is_empty() {
            return Err(Error::InvalidInput("Key file cannot be empty".to_string()));
        }

        let mut digest = [0u8; KEY_LENGTH];
        if contents.len() == KEY_LENGTH {
            digest.copy_from_slice(contents);
        } else if contents.len() != 2 * KEY_LENGTH
            || hex::decode_to_slice(contents, &mut digest).is_err()
        {
            digest.copy_from_slice(&Sha256::digest(contents));
        }

        Ok(Self { digest })
    }
}

impl KeySource for FileKey {
    fn raw_key(&self) -> [u8; KEY_LENGTH] {
        self.digest
    }

    fn clone_box(&self) -> Box<dyn KeySource> {
        Box::new(self.clone())
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileKey([REDACTED])")
    }
}

/// Software HMAC-SHA1 responder, the same computation a hardware token
/// slot performs.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct HmacChallengeResponse {
    secret: Vec<u8>,
}

impl HmacChallengeResponse {
    /// Create a responder holding `secret`.
    ///
    /// # Errors
    /// - Returns error if the secret is empty
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::InvalidInput(
                "Challenge-response secret cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }
}

impl ChallengeResponseKey for HmacChallengeResponse {
    fn challenge(&self, seed: &[u8]) -> Result<Vec<u8>> {
        let mut mac = Hmac::<Sha1>::new_from_slice(&self.secret)
            .map_err(|e| Error::Crypto(format!("Invalid HMAC key: {}", e)))?;
        mac.update(seed);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl fmt::Debug for HmacChallengeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacChallengeResponse([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_key_is_sha256() {
        let key = PasswordKey::new("password");
        let expected = Sha256::digest(b"password");
        assert_eq!(&key.raw_key()[..], &expected[..]);
    }

    #[test]
    fn test_file_key_raw_32_bytes() {
        let contents = [7u8; KEY_LENGTH];
        let key = FileKey::from_contents(&contents).unwrap();
        assert_eq!(key.raw_key(), contents);
    }

    #[test]
    fn test_file_key_hex() {
        let hex_contents = "ab".repeat(KEY_LENGTH);
        let key = FileKey::from_contents(hex_contents.as_bytes()).unwrap();
        assert_eq!(key.raw_key(), [0xABu8; KEY_LENGTH]);
    }

    #[test]
    fn test_file_key_hashed() {
        let contents = b"zz".repeat(KEY_LENGTH);
        let key = FileKey::from_contents(&contents).unwrap();
        let expected = Sha256::digest(&contents);
        assert_eq!(&key.raw_key()[..], &expected[..]);

        assert!(FileKey::from_contents(b"").is_err());
    }

    #[test]
    fn test_raw_key_ct_eq() {
        let a = RawKey::from_bytes([1u8; KEY_LENGTH]);
        let b = RawKey::from_bytes([1u8; KEY_LENGTH]);
        let c = RawKey::from_bytes([2u8; KEY_LENGTH]);
        assert!(a.ct_eq(&b));
        assert!(!a.ct_eq(&c));
    }

    #[test]
    fn test_hmac_challenge_response() {
        let responder = HmacChallengeResponse::new(b"token-secret").unwrap();
        let first = responder.challenge(b"seed").unwrap();
        let second = responder.challenge(b"seed").unwrap();
        let other = responder.challenge(b"other-seed").unwrap();

        assert_eq!(first.len(), 20);
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(HmacChallengeResponse::new(b"").is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        assert_eq!(format!("{:?}", MasterKey::from_bytes([9u8; KEY_LENGTH])), "MasterKey([REDACTED])");
        assert_eq!(format!("{:?}", PasswordKey::new("x")), "PasswordKey([REDACTED])");
    }
}
