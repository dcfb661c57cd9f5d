//! Wire-format receipt claims: the JWS payload shape, independent of any
//! particular settlement rail.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `payment.env`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Live,
    Test,
}

/// The rail-specific settlement block carried on a receipt. `rail` and
/// `reference` plus the amount/currency pair are the parity-relevant core;
/// everything else (`asset`, `env`, `evidence`, `metadata`) is dropped by
/// [`crate::core_claims::to_core_claims`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentBlock {
    pub rail: String,
    pub reference: String,
    pub amount: u64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub env: Option<Environment>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub evidence: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<Value>,
}

/// `control.decision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
    Warn,
}

/// One entry of `control.chain`. Only `engine` and `result` survive
/// normalization; any other fields a policy engine attached (`policy_id`,
/// `version`, `reason`, `evidence_ref`, `scope`, `limits_snapshot`, ...) are
/// preserved here for the non-core side via `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlChainEntry {
    pub engine: String,
    pub result: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Policy-chain attestation attached under `ext.control`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlBlock {
    pub chain: Vec<ControlChainEntry>,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub combinator: Option<String>,
}

/// `ext`: namespaced extensions. `control` is the only extension this crate
/// understands directly; any other namespace passes through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ext {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub control: Option<ControlBlock>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The full receipt claims set — the JWS payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptClaims {
    pub iss: String,
    pub aud: String,
    pub iat: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exp: Option<u64>,
    pub rid: String,
    pub amt: u64,
    pub cur: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub subject: Option<Value>,
    pub payment: PaymentBlock,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ext: Option<Ext>,
}

impl ReceiptClaims {
    pub fn control(&self) -> Option<&ControlBlock> {
        self.ext.as_ref().and_then(|ext| ext.control.as_ref())
    }
}
