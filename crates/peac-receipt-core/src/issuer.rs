//! Receipt issuance: validates a payment request, builds claims, signs.

use ed25519_dalek::SigningKey;
use serde_json::Value;
use time::OffsetDateTime;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::claims::{Ext, PaymentBlock, ReceiptClaims};
use crate::rails::is_known_rail;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IssueError {
    #[error("`iss` must be an https:// URL")]
    InvalidIssuer,
    #[error("`aud` must be an https:// URL")]
    InvalidAudience,
    #[error("`cur` must match ^[A-Z]{{3}}$")]
    InvalidCurrency,
    #[error("`rail` `{0}` is not a recognized settlement rail")]
    UnrecognizedRail(String),
    #[error("`reference` must be non-empty")]
    EmptyReference,
}

/// Everything the issuer needs to mint one receipt. Field order mirrors the
/// wire claims this produces.
#[derive(Debug, Clone, TypedBuilder)]
pub struct IssueRequest {
    pub iss: String,
    pub aud: String,
    pub amt: u64,
    pub cur: String,
    pub rail: String,
    pub reference: String,
    #[builder(default, setter(strip_option))]
    pub asset: Option<String>,
    #[builder(default, setter(strip_option))]
    pub env: Option<crate::claims::Environment>,
    #[builder(default, setter(strip_option))]
    pub evidence: Option<Value>,
    #[builder(default, setter(strip_option))]
    pub subject: Option<Value>,
    #[builder(default, setter(strip_option))]
    pub ext: Option<Ext>,
    #[builder(default, setter(strip_option))]
    pub exp: Option<u64>,
    pub kid: String,
}

fn validate(request: &IssueRequest) -> Result<(), IssueError> {
    if !request.iss.starts_with("https://") {
        return Err(IssueError::InvalidIssuer);
    }
    if !request.aud.starts_with("https://") {
        return Err(IssueError::InvalidAudience);
    }
    let cur_is_valid =
        request.cur.len() == 3 && request.cur.bytes().all(|b| b.is_ascii_uppercase());
    if !cur_is_valid {
        return Err(IssueError::InvalidCurrency);
    }
    if !is_known_rail(&request.rail) {
        return Err(IssueError::UnrecognizedRail(request.rail.clone()));
    }
    if request.reference.is_empty() {
        return Err(IssueError::EmptyReference);
    }
    Ok(())
}

/// A freshly issued receipt: the structured claims alongside the compact
/// JWS that actually went over the wire.
#[derive(Debug, Clone)]
pub struct IssuedReceipt {
    pub claims: ReceiptClaims,
    pub jws: String,
}

/// Builds claims from a validated [`IssueRequest`] and signs them. No I/O
/// beyond the signing key already held in memory.
pub fn issue(request: &IssueRequest, signing_key: &SigningKey) -> Result<IssuedReceipt, IssueError> {
    validate(request)?;

    let iat = u64::try_from(OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0);
    let rid = Uuid::now_v7().to_string();

    let claims = ReceiptClaims {
        iss: request.iss.clone(),
        aud: request.aud.clone(),
        iat,
        exp: request.exp,
        rid,
        amt: request.amt,
        cur: request.cur.clone(),
        subject: request.subject.clone(),
        payment: PaymentBlock {
            rail: request.rail.clone(),
            reference: request.reference.clone(),
            amount: request.amt,
            currency: request.cur.clone(),
            asset: request.asset.clone(),
            env: request.env,
            evidence: request.evidence.clone(),
            metadata: None,
        },
        ext: request.ext.clone(),
    };

    // Validation above guarantees a `serde_json::to_value` of well-formed
    // claims never fails; treat it as infallible rather than threading
    // another error variant through a path that cannot occur.
    let payload = serde_json::to_value(&claims).expect("ReceiptClaims always serializes");
    let jws = peac_jws::sign(&payload, signing_key, &request.kid).expect("key and kid already validated by caller");

    Ok(IssuedReceipt { claims, jws })
}
