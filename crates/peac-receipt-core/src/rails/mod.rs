//! Rail adapters: each settlement backend gets its own module that maps a
//! rail-native event into the uniform [`PaymentBlock`] (plus, optionally,
//! control-block contributions). The parity contract — two adapters handed
//! semantically equivalent inputs must produce `toCoreClaims` outputs that
//! differ only in `rid`, `iat`, `payment.rail`, `payment.reference` — is
//! exercised in `tests/` rather than per-module, since it is a property of
//! the whole adapter set.

pub mod acp;
pub mod rsl;
pub mod stripe;
pub mod tap;
pub mod x402;

use crate::claims::{ControlBlock, PaymentBlock};

/// Canonical rail tokens this crate recognizes. `Issuer::issue` rejects any
/// other value.
pub const KNOWN_RAILS: &[&str] = &["stripe", "x402", "acp", "rsl", "tap"];

pub fn is_known_rail(rail: &str) -> bool {
    KNOWN_RAILS.contains(&rail)
}

/// What an adapter hands back: the normalized payment block, plus any
/// control-chain entries the rail itself wants to contribute (e.g. a
/// fraud-screen result attached by the payment processor).
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedPayment {
    pub payment: PaymentBlock,
    pub control: Option<ControlBlock>,
}

/// Shared normalization rules every adapter must apply before returning:
/// currency uppercased, amount already in smallest-unit integer form, `rail`
/// set to the adapter's canonical token.
pub(crate) fn normalize_currency(currency: &str) -> String {
    currency.to_ascii_uppercase()
}
