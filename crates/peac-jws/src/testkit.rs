//! Deterministic key material for tests and golden vectors. Never use
//! [`deterministic_signing_key`] outside a test or fixture: the whole point
//! is that the same seed always yields the same key.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::PRIVATE_KEY_LEN;

/// Derives a signing key from a `u64` seed via a seeded CSPRNG, so the same
/// seed always produces the same key across runs and platforms.
pub fn deterministic_signing_key(seed: u64) -> SigningKey {
    let mut rng = StdRng::seed_from_u64(seed);
    SigningKey::generate(&mut rng)
}

/// Re-derives the public key from `signing_key` and compares it byte-for-byte
/// against `verifying_key`, catching a JWK whose `x` was copied from a
/// different keypair than its `d`.
pub fn validate_keypair(signing_key: &SigningKey, verifying_key: &VerifyingKey) -> bool {
    signing_key.verifying_key().as_bytes() == verifying_key.as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_key() {
        let a = deterministic_signing_key(7);
        let b = deterministic_signing_key(7);
        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_eq!(a.to_bytes().len(), PRIVATE_KEY_LEN);
    }

    #[test]
    fn different_seeds_yield_different_keys() {
        let a = deterministic_signing_key(1);
        let b = deterministic_signing_key(2);
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn validate_keypair_accepts_matching_pair() {
        let sk = deterministic_signing_key(42);
        let pk = sk.verifying_key();
        assert!(validate_keypair(&sk, &pk));
    }

    #[test]
    fn validate_keypair_rejects_mismatched_pair() {
        let sk = deterministic_signing_key(42);
        let other_pk = deterministic_signing_key(43).verifying_key();
        assert!(!validate_keypair(&sk, &other_pk));
    }
}
