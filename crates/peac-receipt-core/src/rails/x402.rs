//! x402 micropayment settlement events (HTTP 402 Payment Required flow).

use super::{normalize_currency, AdaptedPayment};
use crate::claims::PaymentBlock;

#[derive(Debug, Clone)]
pub struct X402Settlement {
    pub invoice_id: String,
    pub amount: u64,
    pub currency: String,
    pub asset: Option<String>,
}

pub fn adapt(settlement: &X402Settlement) -> AdaptedPayment {
    AdaptedPayment {
        payment: PaymentBlock {
            rail: "x402".to_owned(),
            reference: settlement.invoice_id.clone(),
            amount: settlement.amount,
            currency: normalize_currency(&settlement.currency),
            asset: settlement.asset.clone(),
            env: None,
            evidence: None,
            metadata: None,
        },
        control: None,
    }
}
