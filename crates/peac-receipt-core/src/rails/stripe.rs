//! Stripe checkout-session settlement events.

use serde_json::Value;

use super::{normalize_currency, AdaptedPayment};
use crate::claims::PaymentBlock;

/// A Stripe checkout session as it would appear in a webhook payload, pared
/// down to the fields this adapter needs.
#[derive(Debug, Clone)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub amount_total: u64,
    /// Stripe reports currency lowercase (`"usd"`); normalized to uppercase.
    pub currency: String,
    pub livemode: bool,
    pub payment_intent: Option<String>,
}

pub fn adapt(session: &StripeCheckoutSession) -> AdaptedPayment {
    let evidence = session
        .payment_intent
        .as_ref()
        .map(|intent| Value::String(intent.clone()));

    AdaptedPayment {
        payment: PaymentBlock {
            rail: "stripe".to_owned(),
            reference: session.id.clone(),
            amount: session.amount_total,
            currency: normalize_currency(&session.currency),
            asset: None,
            env: Some(if session.livemode {
                crate::claims::Environment::Live
            } else {
                crate::claims::Environment::Test
            }),
            evidence,
            metadata: None,
        },
        control: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_lowercase_currency() {
        let session = StripeCheckoutSession {
            id: "cs_test_stripe_123".to_owned(),
            amount_total: 9999,
            currency: "usd".to_owned(),
            livemode: false,
            payment_intent: None,
        };
        let adapted = adapt(&session);
        assert_eq!(adapted.payment.currency, "USD");
        assert_eq!(adapted.payment.rail, "stripe");
    }
}
