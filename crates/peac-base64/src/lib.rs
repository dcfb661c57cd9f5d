//! Base64url (RFC 4648 §5) with no padding on the wire, tolerant decoding.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use thiserror::Error;

/// The engine used for encoding: URL-safe alphabet, padding omitted.
const ENCODE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
#[error("invalid base64url input")]
pub struct DecodeError {
    #[from]
    source: base64::DecodeError,
}

/// Encode bytes as base64url without padding.
pub fn encode(input: impl AsRef<[u8]>) -> String {
    ENCODE_ENGINE.encode(input)
}

/// Decode base64url input. Accepts both padded and unpadded forms, tolerates
/// either `-`/`_` (url-safe) alphabet only — standard `+`/`/` is rejected.
pub fn decode(input: impl AsRef<[u8]>) -> Result<Vec<u8>, DecodeError> {
    Ok(ENCODE_ENGINE.decode(input.as_ref())?)
}

/// Encode a UTF-8 string's bytes as base64url.
pub fn encode_str(input: &str) -> String {
    encode(input.as_bytes())
}

/// Decode base64url input into a UTF-8 string.
pub fn decode_to_string(input: impl AsRef<[u8]>) -> Result<String, DecodeStringError> {
    let bytes = decode(input)?;
    String::from_utf8(bytes).map_err(|source| DecodeStringError::Utf8 { source })
}

#[derive(Debug, Error)]
pub enum DecodeStringError {
    #[error(transparent)]
    Base64(#[from] DecodeError),
    #[error("decoded bytes are not valid UTF-8")]
    Utf8 {
        #[source]
        source: std::string::FromUtf8Error,
    },
}
