//! Composite key: combination of every registered credential factor.
//!
//! Combining factors is fast and pure (one SHA-256 over the factor digests),
//! so two composite keys can be compared cheaply. Only [`CompositeKey::transform`]
//! engages hardware tokens and the expensive KDF.

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::kdf::Kdf;
use crate::keys::{ChallengeResponseKey, KeySource, MasterKey, RawKey, KEY_LENGTH};
use strongroom_common::{Result, SensitiveBytes};

/// Ordered set of credential factors.
///
/// Plain sources are owned clones. Challenge-response sources are shared
/// handles whose owners keep using them. Configure fully before deriving:
/// the type is not meant to be mutated while another thread derives.
#[derive(Clone, Default)]
pub struct CompositeKey {
    keys: Vec<Box<dyn KeySource>>,
    challenge_response_keys: Vec<Arc<dyn ChallengeResponseKey>>,
}

impl CompositeKey {
    /// Create an empty composite key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a clone of `key`.
    pub fn add_key(&mut self, key: &dyn KeySource) {
        self.keys.push(key.clone_box());
    }

    /// Append a shared challenge-response source.
    pub fn add_challenge_response_key(&mut self, key: Arc<dyn ChallengeResponseKey>) {
        self.challenge_response_keys.push(key);
    }

    /// Whether no factor of either kind is registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.challenge_response_keys.is_empty()
    }

    /// Drop every registered factor.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.challenge_response_keys.clear();
    }

    /// Challenge every challenge-response source with `seed`.
    ///
    /// With no challenge-response source registered this succeeds with an
    /// empty result, so vaults that never used a hardware factor keep
    /// deriving the same key.
    ///
    /// # Errors
    /// - The first failing source aborts the whole challenge
    pub fn challenge(&self, seed: &[u8]) -> Result<SensitiveBytes> {
        if self.challenge_response_keys.is_empty() {
            return Ok(SensitiveBytes::empty());
        }

        let mut hasher = Sha256::new();
        for key in &self.challenge_response_keys {
            let response = key.challenge(seed).map_err(|e| {
                warn!(error = %e, "Failed to issue challenge");
                e
            })?;
            hasher.update(&response);
        }

        Ok(SensitiveBytes::new(hasher.finalize().to_vec()))
    }

    /// Hash all plain factors, plus the challenge result when `seed` is given.
    ///
    /// An empty challenge result feeds nothing into the hash, so
    /// `raw_key(Some(seed))` equals `raw_key(None)` when no
    /// challenge-response source is registered.
    ///
    /// # Errors
    /// - Propagates challenge-response failures
    pub fn raw_key(&self, seed: Option<&[u8]>) -> Result<RawKey> {
        let mut hasher = Sha256::new();

        for key in &self.keys {
            hasher.update(key.raw_key());
        }

        if let Some(seed) = seed {
            let response = self.challenge(seed)?;
            hasher.update(response.as_bytes());
        }

        let mut raw = [0u8; KEY_LENGTH];
        raw.copy_from_slice(&hasher.finalize());
        Ok(RawKey::from_bytes(raw))
    }

    /// Derive the final key: `kdf(raw_key(seed))`.
    pub fn transform(&self, kdf: &dyn Kdf, seed: Option<&[u8]>) -> Result<MasterKey> {
        let raw = self.raw_key(seed)?;
        kdf.transform(&raw)
    }

    /// Compare the plain factors of two composite keys in constant time.
    ///
    /// Challenge-response sources are not consulted.
    pub fn matches(&self, other: &CompositeKey) -> Result<bool> {
        Ok(self.raw_key(None)?.ct_eq(&other.raw_key(None)?))
    }
}

impl fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeKey")
            .field("keys", &self.keys.len())
            .field("challenge_response_keys", &self.challenge_response_keys.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::{Argon2Kdf, KdfParams, Salt};
    use crate::keys::{FileKey, HmacChallengeResponse, PasswordKey};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strongroom_common::Error;

    struct FailingToken;

    impl ChallengeResponseKey for FailingToken {
        fn challenge(&self, _seed: &[u8]) -> Result<Vec<u8>> {
            Err(Error::Crypto("device not present".to_string()))
        }
    }

    struct CountingToken {
        calls: AtomicUsize,
    }

    impl ChallengeResponseKey for CountingToken {
        fn challenge(&self, seed: &[u8]) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(seed.iter().rev().copied().collect())
        }
    }

    fn cheap_kdf() -> Argon2Kdf {
        Argon2Kdf::new(
            Salt::from_bytes([8u8; 32]),
            KdfParams {
                memory_cost: 64,
                time_cost: 1,
                parallelism: 1,
            },
        )
    }

    #[test]
    fn test_challenge_without_sources_is_empty() {
        let mut key = CompositeKey::new();
        key.add_key(&PasswordKey::new("secret"));

        let response = key.challenge(b"seed").unwrap();
        assert!(response.is_empty());
    }

    #[test]
    fn test_raw_key_with_seed_equals_without_when_no_challenge() {
        let mut key = CompositeKey::new();
        key.add_key(&PasswordKey::new("secret"));

        let with_seed = key.raw_key(Some(b"master-seed")).unwrap();
        let without = key.raw_key(None).unwrap();
        assert_eq!(with_seed.as_bytes(), without.as_bytes());
    }

    #[test]
    fn test_single_source_is_hash_of_its_digest() {
        let password = PasswordKey::new("secret");
        let mut key = CompositeKey::new();
        key.add_key(&password);

        let expected = Sha256::digest(password.raw_key());
        assert_eq!(&key.raw_key(Some(b"any")).unwrap().as_bytes()[..], &expected[..]);
    }

    #[test]
    fn test_order_of_sources_matters() {
        let password = PasswordKey::new("secret");
        let file = FileKey::from_contents(b"key file contents").unwrap();

        let mut a = CompositeKey::new();
        a.add_key(&password);
        a.add_key(&file);

        let mut b = CompositeKey::new();
        b.add_key(&file);
        b.add_key(&password);

        assert!(!a.matches(&b).unwrap());
    }

    #[test]
    fn test_challenge_response_changes_raw_key() {
        let mut key = CompositeKey::new();
        key.add_key(&PasswordKey::new("secret"));
        let plain = key.raw_key(Some(b"seed")).unwrap();

        key.add_challenge_response_key(Arc::new(HmacChallengeResponse::new(b"token").unwrap()));
        let with_token = key.raw_key(Some(b"seed")).unwrap();
        let without_seed = key.raw_key(None).unwrap();

        assert!(!plain.ct_eq(&with_token));
        assert!(plain.ct_eq(&without_seed));
        assert_eq!(key.challenge(b"seed").unwrap().len(), 32);
    }

    #[test]
    fn test_first_failure_aborts_challenge() {
        let counting = Arc::new(CountingToken {
            calls: AtomicUsize::new(0),
        });
        let mut key = CompositeKey::new();
        key.add_challenge_response_key(Arc::new(FailingToken));
        key.add_challenge_response_key(counting.clone());

        assert!(matches!(key.challenge(b"seed"), Err(Error::Crypto(_))));
        assert!(key.raw_key(Some(b"seed")).is_err());
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_challenge_response_handles_are_shared() {
        let counting = Arc::new(CountingToken {
            calls: AtomicUsize::new(0),
        });
        let mut key = CompositeKey::new();
        key.add_challenge_response_key(counting.clone());
        let copy = key.clone();

        key.challenge(b"a").unwrap();
        copy.challenge(b"b").unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_transform_applies_kdf() {
        let mut key = CompositeKey::new();
        key.add_key(&PasswordKey::new("secret"));
        let kdf = cheap_kdf();

        let derived = key.transform(&kdf, None).unwrap();
        let expected = kdf.transform(&key.raw_key(None).unwrap()).unwrap();
        assert_eq!(derived.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn test_transform_propagates_challenge_failure() {
        let mut key = CompositeKey::new();
        key.add_key(&PasswordKey::new("secret"));
        key.add_challenge_response_key(Arc::new(FailingToken));

        assert!(key.transform(&cheap_kdf(), Some(b"seed")).is_err());
        assert!(key.transform(&cheap_kdf(), None).is_ok());
    }

    #[test]
    fn test_clear_and_is_empty() {
        let mut key = CompositeKey::new();
        assert!(key.is_empty());
        key.add_key(&PasswordKey::new("secret"));
        assert!(!key.is_empty());
        key.clear();
        assert!(key.is_empty());
    }

    proptest! {
        #[test]
        fn prop_raw_key_is_deterministic(
            passwords in proptest::collection::vec("[a-zA-Z0-9]{0,16}", 0..4),
            seed in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..32)),
        ) {
            let mut key = CompositeKey::new();
            for password in &passwords {
                key.add_key(&PasswordKey::new(password));
            }
            key.add_challenge_response_key(Arc::new(HmacChallengeResponse::new(b"token").unwrap()));

            let first = key.raw_key(seed.as_deref()).unwrap();
            let second = key.raw_key(seed.as_deref()).unwrap();
            prop_assert_eq!(first.as_bytes(), second.as_bytes());
        }
    }
}
