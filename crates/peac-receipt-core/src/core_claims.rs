//! `toCoreClaims`: projects a [`ReceiptClaims`] onto the rail-agnostic
//! comparable form used for parity testing across adapters.

use serde::Serialize;
use serde_json::Value;

use crate::claims::ReceiptClaims;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreControlChainEntry {
    pub engine: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorePayment {
    pub rail: String,
    pub reference: String,
    pub amount: u64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreClaims {
    pub iss: String,
    pub aud: String,
    pub iat: u64,
    pub amt: u64,
    pub cur: String,
    pub rid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Value>,
    pub payment: CorePayment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_chain: Option<Vec<CoreControlChainEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_decision: Option<String>,
}

/// Drops everything non-core: `payment.evidence`, `payment.asset`,
/// `payment.env`, `payment.metadata`, and every extension field except
/// `control.chain[].{engine,result}` and `control.decision`.
pub fn to_core_claims(claims: &ReceiptClaims) -> CoreClaims {
    let control = claims.control();
    let control_chain = control.map(|c| {
        c.chain
            .iter()
            .map(|entry| CoreControlChainEntry {
                engine: entry.engine.clone(),
                result: entry.result.clone(),
            })
            .collect()
    });
    let control_decision = control.map(|c| match c.decision {
        crate::claims::Decision::Allow => "allow".to_owned(),
        crate::claims::Decision::Deny => "deny".to_owned(),
        crate::claims::Decision::Warn => "warn".to_owned(),
    });

    CoreClaims {
        iss: claims.iss.clone(),
        aud: claims.aud.clone(),
        iat: claims.iat,
        amt: claims.amt,
        cur: claims.cur.clone(),
        rid: claims.rid.clone(),
        subject: claims.subject.clone(),
        payment: CorePayment {
            rail: claims.payment.rail.clone(),
            reference: claims.payment.reference.clone(),
            amount: claims.payment.amount,
            currency: claims.payment.currency.clone(),
        },
        control_chain,
        control_decision,
    }
}

/// JCS-canonicalizes the core claims, for byte-identical parity comparison.
pub fn jcs_core_claims(claims: &ReceiptClaims) -> Result<Vec<u8>, CoreClaimsError> {
    let core = to_core_claims(claims);
    let value = serde_json::to_value(core).map_err(CoreClaimsError::Serialize)?;
    peac_jcs::canonicalize(&value).map_err(CoreClaimsError::Jcs)
}

#[derive(Debug, thiserror::Error)]
pub enum CoreClaimsError {
    #[error("failed to serialize core claims to JSON")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to canonicalize core claims")]
    Jcs(#[source] peac_jcs::JcsError),
}
