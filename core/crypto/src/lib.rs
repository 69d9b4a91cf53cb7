//! Cryptographic primitives for Strongroom.
//!
//! This module provides:
//! - Keystream ciphers used to decrypt protected values in a vault document
//! - Credential factors (password, key file, challenge-response)
//! - The composite key deriver combining those factors
//! - A pluggable key derivation step, with Argon2 as the provided strategy
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time operations for sensitive comparisons

pub mod composite;
pub mod kdf;
pub mod keys;
pub mod stream;

pub use composite::CompositeKey;
pub use kdf::{Argon2Kdf, Argon2Variant, Kdf, KdfParams, Salt};
pub use keys::{
    ChallengeResponseKey, FileKey, HmacChallengeResponse, KeySource, MasterKey, PasswordKey,
    RawKey, KEY_LENGTH,
};
pub use stream::{ChaCha20Stream, KeystreamCipher, ProtectedStreamAlgo, Salsa20Stream};
