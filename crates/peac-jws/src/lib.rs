//! Compact Ed25519 JWS: sign/verify against the fixed `peac-receipt` header
//! profile. `typ` and `alg` are not negotiable — any deviation on verify is
//! rejected before the signature is even decoded, which keeps the signature
//! oracle as small as possible.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod testkit;

/// Canonical `typ` header value. The source history also contains
/// `peac.receipt/0.9`; only this value is accepted.
pub const TYP: &str = "peac-receipt/0.1";
/// The only signature algorithm this profile accepts.
pub const ALG: &str = "EdDSA";

pub const PRIVATE_KEY_LEN: usize = 32;
pub const PUBLIC_KEY_LEN: usize = 32;

/// `{typ, alg, kid}`, in this field order — `serde_json` preserves struct
/// field declaration order for non-`Map` serialization, so issuance always
/// emits `typ` then `alg` then `kid` as the wire format requires. Verifiers
/// must accept any order, which is why header parsing goes through
/// `serde_json::Value` rather than this struct directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub typ: String,
    pub alg: String,
    pub kid: String,
}

impl JwsHeader {
    pub fn new(kid: impl Into<String>) -> Self {
        Self {
            typ: TYP.to_owned(),
            alg: ALG.to_owned(),
            kid: kid.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwsError {
    #[error("jws must have exactly three dot-separated segments")]
    InvalidJwsFormat,
    #[error("jws header `typ` must be `{TYP}`")]
    InvalidTyp,
    #[error("jws header `alg` must be `{ALG}`")]
    InvalidAlg,
    #[error("jws segment is not valid base64url or not valid UTF-8/JSON")]
    Malformed,
    #[error("key length must be exactly {PRIVATE_KEY_LEN} bytes, got {actual}")]
    InvalidKeyLength { actual: usize },
}

/// The result of [`verify`]: header-profile and format errors are returned
/// as `Err` before the signature is ever inspected (cheap rejection), but a
/// structurally valid JWS with a bad signature is returned as `Ok` with
/// `valid: false` rather than `Err`, so callers get a uniform, constant-time
/// verification outcome instead of branching on error variants for the
/// security-relevant check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedJws {
    pub header: JwsHeader,
    pub payload: Value,
    pub valid: bool,
}

/// Generate a fresh signing key from any cryptographically secure RNG (e.g.
/// `rand::rngs::OsRng`). Tests that need a reproducible key should use
/// [`testkit::deterministic_signing_key`] instead.
pub fn generate_signing_key<R: CryptoRng + RngCore>(rng: &mut R) -> SigningKey {
    SigningKey::generate(rng)
}

/// Build a 32-byte Ed25519 signing key, rejecting any other length.
pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey, JwsError> {
    let arr: [u8; PRIVATE_KEY_LEN] =
        bytes
            .try_into()
            .map_err(|_| JwsError::InvalidKeyLength { actual: bytes.len() })?;
    Ok(SigningKey::from_bytes(&arr))
}

/// Build a 32-byte Ed25519 verifying key, rejecting any other length.
pub fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey, JwsError> {
    let arr: [u8; PUBLIC_KEY_LEN] =
        bytes
            .try_into()
            .map_err(|_| JwsError::InvalidKeyLength { actual: bytes.len() })?;
    VerifyingKey::from_bytes(&arr).map_err(|_| JwsError::InvalidKeyLength { actual: bytes.len() })
}

/// Sign `payload` (any JSON-serializable value) under `kid`, returning the
/// compact `header.payload.signature` string. Deterministic: the same
/// `signing_key`, `kid`, and `payload` always produce the same JWS — Ed25519
/// signing is itself deterministic, and the encodings here have no
/// non-determinism (no timestamps, no randomness) of their own.
pub fn sign(payload: &Value, signing_key: &SigningKey, kid: &str) -> Result<String, JwsError> {
    let header = JwsHeader::new(kid);
    let header_json = serde_json::to_vec(&header).map_err(|_| JwsError::Malformed)?;
    let payload_json = serde_json::to_vec(payload).map_err(|_| JwsError::Malformed)?;

    let header_b64 = peac_base64::encode(&header_json);
    let payload_b64 = peac_base64::encode(&payload_json);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let signature = signing_key.sign(signing_input.as_bytes());
    let sig_b64 = peac_base64::encode(signature.to_bytes());

    Ok(format!("{signing_input}.{sig_b64}"))
}

/// Parse and verify a compact JWS. Header-profile violations (`typ`/`alg`
/// mismatch) and structural malformation are rejected before the signature
/// is decoded or checked. A well-formed JWS with a bad signature comes back
/// as `Ok(VerifiedJws { valid: false, .. })`.
pub fn verify(jws: &str, verifying_key: &VerifyingKey) -> Result<VerifiedJws, JwsError> {
    let mut segments = jws.split('.');
    let header_b64 = segments.next().ok_or(JwsError::InvalidJwsFormat)?;
    let payload_b64 = segments.next().ok_or(JwsError::InvalidJwsFormat)?;
    let sig_b64 = segments.next().ok_or(JwsError::InvalidJwsFormat)?;
    if segments.next().is_some() {
        return Err(JwsError::InvalidJwsFormat);
    }

    let header_bytes = peac_base64::decode(header_b64).map_err(|_| JwsError::Malformed)?;
    let header_value: Value =
        serde_json::from_slice(&header_bytes).map_err(|_| JwsError::Malformed)?;

    // Profile check runs against the raw JSON value, not the strongly-typed
    // struct, because `typ`/`alg` must be rejected with a specific error
    // even when the header carries extra or reordered fields.
    match header_value.get("typ").and_then(Value::as_str) {
        Some(t) if t == TYP => {}
        _ => return Err(JwsError::InvalidTyp),
    }
    match header_value.get("alg").and_then(Value::as_str) {
        Some(a) if a == ALG => {}
        _ => return Err(JwsError::InvalidAlg),
    }
    let header: JwsHeader = serde_json::from_value(header_value).map_err(|_| JwsError::Malformed)?;

    let payload_bytes = peac_base64::decode(payload_b64).map_err(|_| JwsError::Malformed)?;
    let payload: Value = serde_json::from_slice(&payload_bytes).map_err(|_| JwsError::Malformed)?;

    let sig_bytes = peac_base64::decode(sig_b64).map_err(|_| JwsError::Malformed)?;
    let valid = match <[u8; 64]>::try_from(sig_bytes.as_slice()) {
        Ok(arr) => {
            let signature = Signature::from_bytes(&arr);
            let signing_input = format!("{header_b64}.{payload_b64}");
            verifying_key
                .verify(signing_input.as_bytes(), &signature)
                .is_ok()
        }
        Err(_) => false,
    };

    Ok(VerifiedJws { header, payload, valid })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keypair() -> (SigningKey, VerifyingKey) {
        let sk = SigningKey::from_bytes(&[9u8; 32]);
        let pk = sk.verifying_key();
        (sk, pk)
    }

    #[test]
    fn round_trip_valid() {
        let (sk, pk) = keypair();
        let payload = json!({"iss": "https://issuer.example", "amt": 100});
        let jws = sign(&payload, &sk, "2024-01-01T00:00Z").unwrap();
        let verified = verify(&jws, &pk).unwrap();
        assert!(verified.valid);
        assert_eq!(verified.payload, payload);
        assert_eq!(verified.header.kid, "2024-01-01T00:00Z");
    }

    #[test]
    fn header_field_order_is_typ_alg_kid() {
        let (sk, _pk) = keypair();
        let jws = sign(&json!({"a": 1}), &sk, "k1").unwrap();
        let header_b64 = jws.split('.').next().unwrap();
        let header_json = String::from_utf8(peac_base64::decode(header_b64).unwrap()).unwrap();
        assert_eq!(header_json, r#"{"typ":"peac-receipt/0.1","alg":"EdDSA","kid":"k1"}"#);
    }

    #[test]
    fn deterministic_signing() {
        let (sk, _pk) = keypair();
        let payload = json!({"a": 1, "b": 2});
        let jws1 = sign(&payload, &sk, "k1").unwrap();
        let jws2 = sign(&payload, &sk, "k1").unwrap();
        assert_eq!(jws1, jws2);
    }

    #[test]
    fn flipped_bit_in_signature_invalidates() {
        let (sk, pk) = keypair();
        let jws = sign(&json!({"a": 1}), &sk, "k1").unwrap();
        let mut parts: Vec<&str> = jws.split('.').collect();
        let mut sig_bytes = peac_base64::decode(parts[2]).unwrap();
        sig_bytes[0] ^= 0xFF;
        let tampered_sig = peac_base64::encode(&sig_bytes);
        parts[2] = &tampered_sig;
        let tampered = parts.join(".");
        let verified = verify(&tampered, &pk).unwrap();
        assert!(!verified.valid);
    }

    #[test]
    fn tampered_payload_invalidates() {
        let (sk, pk) = keypair();
        let jws = sign(&json!({"amt": 9999}), &sk, "k1").unwrap();
        let parts: Vec<&str> = jws.split('.').collect();
        let rewritten_payload = peac_base64::encode(br#"{"amt":1}"#);
        let tampered = format!("{}.{}.{}", parts[0], rewritten_payload, parts[2]);
        let verified = verify(&tampered, &pk).unwrap();
        assert!(!verified.valid);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let err = verify("a.b", &keypair().1).unwrap_err();
        assert_eq!(err, JwsError::InvalidJwsFormat);
        let err = verify("a.b.c.d", &keypair().1).unwrap_err();
        assert_eq!(err, JwsError::InvalidJwsFormat);
    }

    #[test]
    fn rejects_wrong_typ_before_signature_check() {
        let header = peac_base64::encode(br#"{"typ":"peac.receipt/0.9","alg":"EdDSA","kid":"k"}"#);
        let payload = peac_base64::encode(br#"{}"#);
        let jws = format!("{header}.{payload}.AAAA");
        let err = verify(&jws, &keypair().1).unwrap_err();
        assert_eq!(err, JwsError::InvalidTyp);
    }

    #[test]
    fn rejects_wrong_alg_before_signature_check() {
        let header = peac_base64::encode(br#"{"typ":"peac-receipt/0.1","alg":"RS256","kid":"k"}"#);
        let payload = peac_base64::encode(br#"{}"#);
        let jws = format!("{header}.{payload}.AAAA");
        let err = verify(&jws, &keypair().1).unwrap_err();
        assert_eq!(err, JwsError::InvalidAlg);
    }

    #[test]
    fn accepts_any_header_key_order_on_verify() {
        // The verifier must not care about header key order: it checks
        // `typ`/`alg` via JSON lookup and recomputes the signature over
        // whatever header/payload bytes the JWS actually carries, so a
        // reordered-but-freshly-signed header still verifies.
        let (sk, pk) = keypair();
        let header_b64 =
            peac_base64::encode(br#"{"kid":"k1","typ":"peac-receipt/0.1","alg":"EdDSA"}"#);
        let payload_b64 = peac_base64::encode(br#"{}"#);
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature = sk.sign(signing_input.as_bytes());
        let sig_b64 = peac_base64::encode(signature.to_bytes());
        let jws = format!("{signing_input}.{sig_b64}");

        let verified = verify(&jws, &pk).unwrap();
        assert!(verified.valid);
        assert_eq!(verified.header.kid, "k1");
    }

    #[test]
    fn generated_key_round_trips() {
        let mut rng = rand::rngs::OsRng;
        let sk = generate_signing_key(&mut rng);
        let pk = sk.verifying_key();
        let jws = sign(&json!({"x": 1}), &sk, "k").unwrap();
        assert!(verify(&jws, &pk).unwrap().valid);
    }

    #[test]
    fn rejects_wrong_key_length() {
        let err = signing_key_from_bytes(&[0u8; 31]).unwrap_err();
        assert_eq!(err, JwsError::InvalidKeyLength { actual: 31 });
        let err = verifying_key_from_bytes(&[0u8; 16]).unwrap_err();
        assert_eq!(err, JwsError::InvalidKeyLength { actual: 16 });
    }
}
