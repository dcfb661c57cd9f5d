//! Receipt claims, issuance, verification, and rail-parity normalization
//! built on top of [`peac_jws`] and [`peac_jcs`].

pub mod claims;
pub mod core_claims;
pub mod issuer;
pub mod rails;
pub mod replay;
pub mod verifier;

pub use claims::{ControlBlock, ControlChainEntry, Decision, Environment, Ext, PaymentBlock, ReceiptClaims};
pub use core_claims::{to_core_claims, CoreClaims};
pub use issuer::{issue, IssueError, IssueRequest, IssuedReceipt};
pub use replay::ReplayCache;
pub use verifier::{KeyResolver, VerifiedReceipt, VerifyError, Verifier};
