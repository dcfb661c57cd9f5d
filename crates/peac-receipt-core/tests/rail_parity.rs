//! End-to-end rail-parity scenario: two different rails, semantically
//! equivalent settlements, must issue receipts whose core claims are
//! byte-identical once `rid`, `iat`, `payment.rail`, `payment.reference`
//! are normalized away.

use ed25519_dalek::SigningKey;
use peac_receipt_core::issuer::{issue, IssueRequest};
use peac_receipt_core::rails::{stripe, x402};

#[test]
fn stripe_and_x402_parity() {
    let stripe_session = stripe::StripeCheckoutSession {
        id: "cs_test_stripe_123".to_owned(),
        amount_total: 9999,
        currency: "usd".to_owned(),
        livemode: false,
        payment_intent: Some("pi_abc".to_owned()),
    };
    let stripe_adapted = stripe::adapt(&stripe_session);

    let x402_settlement = x402::X402Settlement {
        invoice_id: "inv_x402_123".to_owned(),
        amount: 9999,
        currency: "USD".to_owned(),
        asset: None,
    };
    let x402_adapted = x402::adapt(&x402_settlement);

    let signing_key = SigningKey::from_bytes(&[11u8; 32]);

    let stripe_request = IssueRequest::builder()
        .iss("https://issuer.example".to_owned())
        .aud("https://aud.example".to_owned())
        .amt(stripe_adapted.payment.amount)
        .cur(stripe_adapted.payment.currency.clone())
        .rail(stripe_adapted.payment.rail.clone())
        .reference(stripe_adapted.payment.reference.clone())
        .kid("k1".to_owned())
        .build();
    let x402_request = IssueRequest::builder()
        .iss("https://issuer.example".to_owned())
        .aud("https://aud.example".to_owned())
        .amt(x402_adapted.payment.amount)
        .cur(x402_adapted.payment.currency.clone())
        .rail(x402_adapted.payment.rail.clone())
        .reference(x402_adapted.payment.reference.clone())
        .kid("k1".to_owned())
        .build();

    let stripe_receipt = issue(&stripe_request, &signing_key).unwrap();
    let x402_receipt = issue(&x402_request, &signing_key).unwrap();

    let mut stripe_core = peac_receipt_core::to_core_claims(&stripe_receipt.claims);
    let mut x402_core = peac_receipt_core::to_core_claims(&x402_receipt.claims);

    // The only fields parity allows to differ.
    assert_ne!(stripe_core.rid, x402_core.rid);
    stripe_core.rid = "RID".to_owned();
    x402_core.rid = "RID".to_owned();
    stripe_core.iat = 0;
    x402_core.iat = 0;
    stripe_core.payment.rail = "RAIL".to_owned();
    x402_core.payment.rail = "RAIL".to_owned();
    stripe_core.payment.reference = "REF".to_owned();
    x402_core.payment.reference = "REF".to_owned();

    let a = peac_jcs::canonicalize(&serde_json::to_value(stripe_core).unwrap()).unwrap();
    let b = peac_jcs::canonicalize(&serde_json::to_value(x402_core).unwrap()).unwrap();
    assert_eq!(a, b);
}
