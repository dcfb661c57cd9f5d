//! Transport Profile: decides how a signed receipt gets attached to an
//! outbound HTTP response.

use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_MAX_HEADER_SIZE: usize = 4096;
const MAX_POINTER_URL_BYTES: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Header,
    Body,
    Pointer,
}

#[derive(Debug, Clone)]
pub struct TransportPolicy {
    pub placement: Placement,
    pub max_header_size: usize,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self { placement: Placement::Header, max_header_size: DEFAULT_MAX_HEADER_SIZE }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("pointer URL must be HTTPS")]
    PointerUrlNotHttps,
    #[error("pointer URL contains a disallowed character")]
    PointerUrlDisallowedChar,
    #[error("pointer URL exceeds the maximum length")]
    PointerUrlTooLong,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Header { name: &'static str, value: String },
    Body { envelope: serde_json::Value },
    Pointer { header_name: &'static str, value: String },
}

/// Decides the attachment form for `jws` given `original` (the response
/// body to wrap, only used for the `body` placement) and `policy`.
pub fn attach(
    jws: &str,
    original: &serde_json::Value,
    policy: &TransportPolicy,
    pointer_url: Option<&str>,
) -> Result<Attachment, TransportError> {
    match policy.placement {
        Placement::Header => {
            if jws.len() <= policy.max_header_size {
                Ok(Attachment::Header { name: "PEAC-Receipt", value: jws.to_owned() })
            } else {
                Ok(Attachment::Body {
                    envelope: serde_json::json!({ "data": original, "peac_receipt": jws }),
                })
            }
        }
        Placement::Body => {
            Ok(Attachment::Body { envelope: serde_json::json!({ "data": original, "peac_receipt": jws }) })
        }
        Placement::Pointer => {
            let url = pointer_url.ok_or(TransportError::PointerUrlNotHttps)?;
            validate_pointer_url(url)?;
            let digest = hex::encode(Sha256::digest(jws.as_bytes()));
            Ok(Attachment::Pointer {
                header_name: "PEAC-Receipt-Pointer",
                value: format!(r#"sha256="{digest}", url="{url}""#),
            })
        }
    }
}

fn validate_pointer_url(url: &str) -> Result<(), TransportError> {
    if !url.starts_with("https://") {
        return Err(TransportError::PointerUrlNotHttps);
    }
    if url.len() > MAX_POINTER_URL_BYTES {
        return Err(TransportError::PointerUrlTooLong);
    }
    if url.chars().any(|c| c == '"' || c == '\\' || c.is_control()) {
        return Err(TransportError::PointerUrlDisallowedChar);
    }
    Ok(())
}
