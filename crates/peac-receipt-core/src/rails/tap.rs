//! Trust Attestation Protocol settlement events: a verifying third party
//! co-signs that a counterpart's settlement is trustworthy before the
//! receipt is issued; surfaced here as a control-chain entry plus payment.

use super::{normalize_currency, AdaptedPayment};
use crate::claims::{ControlBlock, ControlChainEntry, Decision, PaymentBlock};

#[derive(Debug, Clone)]
pub struct TapAttestation {
    pub attestation_id: String,
    pub amount: u64,
    pub currency: String,
    pub attestor: String,
    pub trusted: bool,
}

pub fn adapt(attestation: &TapAttestation) -> AdaptedPayment {
    let control = ControlBlock {
        chain: vec![ControlChainEntry {
            engine: attestation.attestor.clone(),
            result: if attestation.trusted { "allow" } else { "deny" }.to_owned(),
            extra: serde_json::Map::new(),
        }],
        decision: if attestation.trusted {
            Decision::Allow
        } else {
            Decision::Deny
        },
        combinator: None,
    };

    AdaptedPayment {
        payment: PaymentBlock {
            rail: "tap".to_owned(),
            reference: attestation.attestation_id.clone(),
            amount: attestation.amount,
            currency: normalize_currency(&attestation.currency),
            asset: None,
            env: None,
            evidence: None,
            metadata: None,
        },
        control: Some(control),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrusted_attestation_denies() {
        let attestation = TapAttestation {
            attestation_id: "tap-1".to_owned(),
            amount: 10,
            currency: "usd".to_owned(),
            attestor: "notary-a".to_owned(),
            trusted: false,
        };
        let adapted = adapt(&attestation);
        let control = adapted.control.unwrap();
        assert_eq!(control.decision, Decision::Deny);
        assert_eq!(control.chain[0].result, "deny");
    }
}
