//! Really Simple Licensing settlement events: a content license grant paid
//! for out-of-band, reported here as a receipt-worthy settlement.

use super::{normalize_currency, AdaptedPayment};
use crate::claims::PaymentBlock;

#[derive(Debug, Clone)]
pub struct RslGrant {
    pub license_id: String,
    pub price: u64,
    pub currency: String,
}

pub fn adapt(grant: &RslGrant) -> AdaptedPayment {
    AdaptedPayment {
        payment: PaymentBlock {
            rail: "rsl".to_owned(),
            reference: grant.license_id.clone(),
            amount: grant.price,
            currency: normalize_currency(&grant.currency),
            asset: None,
            env: None,
            evidence: None,
            metadata: None,
        },
        control: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_license_id_to_reference() {
        let grant = RslGrant {
            license_id: "rsl-license-42".to_owned(),
            price: 250,
            currency: "gbp".to_owned(),
        };
        let adapted = adapt(&grant);
        assert_eq!(adapted.payment.reference, "rsl-license-42");
        assert_eq!(adapted.payment.currency, "GBP");
    }
}
