//! SSRF-hardened outbound fetch: method whitelist, DNS pinning, redirect
//! re-validation, response size budgeting, and a redaction-leveled
//! evidence/audit trail for every attempt.

pub mod audit;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod redirect;
pub mod transport;

pub use audit::{AuditDrain, AuditEvent, AuditEventType, AuditHook, AuditQueue, AuditStats, NullHook};
pub use engine::{
    safe_fetch, safe_fetch_raw, safe_fetch_with_evidence, FetchOutcome, FetchPolicy, RawHandle, TimeoutPolicy,
    DEFAULT_MAX_REDIRECTS, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT_MS, MAX_JWKS_RESPONSE_BYTES,
};
pub use error::FetchError;
pub use evidence::{DnsAnswerRecord, EvidenceContext, PolicyDecision, RedactionKey, RedactionLevel, SelectedIp};
pub use redirect::RedirectPolicy;
pub use transport::{attach as attach_receipt, Attachment, Placement, TransportError, TransportPolicy};
