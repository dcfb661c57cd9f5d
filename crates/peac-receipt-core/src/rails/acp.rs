//! Agentic Commerce Protocol settlement events: an upstream agent reports a
//! completed purchase, optionally with the policy chain that approved it.

use super::{normalize_currency, AdaptedPayment};
use crate::claims::{ControlBlock, ControlChainEntry, Decision, PaymentBlock};

#[derive(Debug, Clone)]
pub struct AcpPurchase {
    pub order_id: String,
    pub amount_minor_units: u64,
    pub currency: String,
    /// Names of policy engines that approved the purchase, in evaluation
    /// order. Each becomes a `control.chain` entry with `result: "allow"`.
    pub approving_engines: Vec<String>,
}

pub fn adapt(purchase: &AcpPurchase) -> AdaptedPayment {
    let control = if purchase.approving_engines.is_empty() {
        None
    } else {
        Some(ControlBlock {
            chain: purchase
                .approving_engines
                .iter()
                .map(|engine| ControlChainEntry {
                    engine: engine.clone(),
                    result: "allow".to_owned(),
                    extra: serde_json::Map::new(),
                })
                .collect(),
            decision: Decision::Allow,
            combinator: Some("any_can_veto".to_owned()),
        })
    };

    AdaptedPayment {
        payment: PaymentBlock {
            rail: "acp".to_owned(),
            reference: purchase.order_id.clone(),
            amount: purchase.amount_minor_units,
            currency: normalize_currency(&purchase.currency),
            asset: None,
            env: None,
            evidence: None,
            metadata: None,
        },
        control,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_allow_chain_from_approving_engines() {
        let purchase = AcpPurchase {
            order_id: "order-1".to_owned(),
            amount_minor_units: 500,
            currency: "eur".to_owned(),
            approving_engines: vec!["budget-guard".to_owned(), "fraud-screen".to_owned()],
        };
        let adapted = adapt(&purchase);
        let control = adapted.control.unwrap();
        assert_eq!(control.chain.len(), 2);
        assert_eq!(control.chain[0].engine, "budget-guard");
        assert_eq!(control.decision, Decision::Allow);
    }
}
