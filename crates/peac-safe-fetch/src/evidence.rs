//! Redaction-leveled audit record, sealed by a JCS-SHA-256 digest at
//! finalization. Produced exactly once per fetch attempt, never mutated
//! afterwards.

use std::net::IpAddr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use peac_net_guard::NetErrorCode;

pub const SCHEMA_VERSION: &str = "peac-safe-fetch-evidence/0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionLevel {
    #[default]
    Public,
    Private,
    Tenant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyDecision {
    Allow,
    Block,
}

/// One DNS answer as recorded for `private`/`tenant` evidence.
#[derive(Debug, Clone)]
pub struct DnsAnswerRecord {
    pub ip: IpAddr,
    pub blocked_reason: Option<NetErrorCode>,
}

/// Everything the engine observed about the IP it actually connected (or
/// tried to connect) to.
#[derive(Debug, Clone)]
pub struct SelectedIp {
    pub ip: IpAddr,
    pub family: u8,
}

/// Accumulates over a single request's lifecycle; consumed by
/// [`finalize`] to produce the sealed, JSON-shaped evidence record.
#[derive(Debug, Clone, Default)]
pub struct EvidenceContext {
    pub request_url: String,
    pub canonical_host: String,
    pub is_ip_literal: bool,
    pub max_response_bytes: u64,
    pub selected_ip: Option<SelectedIp>,
    pub dns_answers: Vec<DnsAnswerRecord>,
    pub dropped: u64,
}

pub struct RedactionKey<'a> {
    pub key: &'a [u8],
    pub key_id: &'a str,
}

fn hash_ip_public(ip: IpAddr) -> String {
    let digest = Sha256::digest(canonical_ip_bytes(ip));
    format!("0x{}", hex::encode(digest))
}

fn hash_ip_tenant(ip: IpAddr, redaction_key: &RedactionKey<'_>) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(redaction_key.key).expect("HMAC accepts any key length");
    mac.update(&canonical_ip_bytes(ip));
    format!("0x{}", hex::encode(mac.finalize().into_bytes()))
}

fn canonical_ip_bytes(ip: IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// Builds the redaction-appropriate evidence object, seals it with
/// `evidence_digest`, and returns the finished JSON value.
///
/// `redaction_key` is required (and validated to be ≥32 bytes by the
/// caller) when `level` is [`RedactionLevel::Tenant`]; absence for that
/// level is a caller bug, surfaced as [`NetErrorCode::TenantKeyMissing`].
pub fn finalize(
    ctx: &EvidenceContext,
    level: RedactionLevel,
    decision: PolicyDecision,
    decision_code: NetErrorCode,
    redaction_key: Option<&RedactionKey<'_>>,
) -> Result<Value, NetErrorCode> {
    if matches!(level, RedactionLevel::Tenant) && redaction_key.is_none() {
        return Err(NetErrorCode::TenantKeyMissing);
    }

    let mut evidence = Map::new();
    evidence.insert("schema_version".into(), json!(SCHEMA_VERSION));
    evidence.insert("evidence_level".into(), json!(level));
    evidence.insert("request_timestamp".into(), json!(current_unix_timestamp()));
    evidence.insert("request_url".into(), json!(ctx.request_url));
    evidence.insert("canonical_host".into(), json!(ctx.canonical_host));
    evidence.insert("is_ip_literal".into(), json!(ctx.is_ip_literal));
    evidence.insert("policy_decision".into(), json!(decision));
    evidence.insert("decision_code".into(), json!(decision_code.as_str()));
    evidence.insert("max_response_bytes".into(), json!(ctx.max_response_bytes));

    let ipv4_count = ctx.dns_answers.iter().filter(|a| a.ip.is_ipv4()).count();
    let ipv6_count = ctx.dns_answers.iter().filter(|a| a.ip.is_ipv6()).count();

    match level {
        RedactionLevel::Public => {
            if let Some(selected) = &ctx.selected_ip {
                evidence.insert(
                    "selected_ip_info".into(),
                    json!({ "family": selected.family, "hash": hash_ip_public(selected.ip) }),
                );
            }
            evidence.insert("dns_answer_count".into(), json!({ "ipv4": ipv4_count, "ipv6": ipv6_count }));
        }
        RedactionLevel::Private => {
            if let Some(selected) = &ctx.selected_ip {
                evidence.insert("selected_ip".into(), json!(selected.ip.to_string()));
            }
            let answers: Vec<Value> = ctx
                .dns_answers
                .iter()
                .map(|a| {
                    let mut entry = Map::new();
                    entry.insert("ip".into(), json!(a.ip.to_string()));
                    if let Some(reason) = a.blocked_reason {
                        entry.insert("blocked_reason".into(), json!(reason.as_str()));
                    }
                    Value::Object(entry)
                })
                .collect();
            evidence.insert("dns_answers".into(), json!(answers));
        }
        RedactionLevel::Tenant => {
            let redaction_key = redaction_key.expect("checked above");
            if let Some(selected) = &ctx.selected_ip {
                evidence.insert(
                    "selected_ip_info".into(),
                    json!({
                        "family": selected.family,
                        "hash": hash_ip_tenant(selected.ip, redaction_key),
                        "key_id": redaction_key.key_id,
                    }),
                );
            }
            evidence.insert("dns_answer_count".into(), json!({ "ipv4": ipv4_count, "ipv6": ipv6_count }));
        }
    }

    if ctx.dropped > 0 {
        evidence.insert("audit_truncated".into(), json!(true));
        evidence.insert("audit_stats".into(), json!({ "dropped": ctx.dropped }));
    }

    let without_digest = Value::Object(evidence.clone());
    let digest = peac_jcs::jcs_hash_hex(&without_digest).map_err(|_| NetErrorCode::ParseError)?;
    evidence.insert("evidence_digest".into(), json!(format!("0x{digest}")));

    Ok(Value::Object(evidence))
}

fn current_unix_timestamp() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_ctx() -> EvidenceContext {
        EvidenceContext {
            request_url: "https://example.com/jwks.json".into(),
            canonical_host: "example.com".into(),
            is_ip_literal: false,
            max_response_bytes: 2 * 1024 * 1024,
            selected_ip: Some(SelectedIp { ip: "93.184.216.34".parse().unwrap(), family: 4 }),
            dns_answers: vec![DnsAnswerRecord { ip: "93.184.216.34".parse().unwrap(), blocked_reason: None }],
            dropped: 0,
        }
    }

    #[test]
    fn public_level_hashes_selected_ip() {
        let ctx = base_ctx();
        let evidence =
            finalize(&ctx, RedactionLevel::Public, PolicyDecision::Allow, NetErrorCode::Allowed, None).unwrap();
        let hash = evidence["selected_ip_info"]["hash"].as_str().unwrap();
        assert!(hash.starts_with("0x"));
        assert_eq!(hash.len(), 66);
        assert!(evidence.get("selected_ip").is_none());
    }

    #[test]
    fn private_level_exposes_raw_ip() {
        let ctx = base_ctx();
        let evidence =
            finalize(&ctx, RedactionLevel::Private, PolicyDecision::Allow, NetErrorCode::Allowed, None).unwrap();
        assert_eq!(evidence["selected_ip"], json!("93.184.216.34"));
    }

    #[test]
    fn tenant_level_requires_redaction_key() {
        let ctx = base_ctx();
        let err = finalize(&ctx, RedactionLevel::Tenant, PolicyDecision::Allow, NetErrorCode::Allowed, None)
            .unwrap_err();
        assert_eq!(err, NetErrorCode::TenantKeyMissing);
    }

    #[test]
    fn tenant_level_hmac_hashes_and_carries_key_id() {
        let ctx = base_ctx();
        let key = RedactionKey { key: &[7u8; 32], key_id: "k1" };
        let evidence =
            finalize(&ctx, RedactionLevel::Tenant, PolicyDecision::Allow, NetErrorCode::Allowed, Some(&key))
                .unwrap();
        assert_eq!(evidence["selected_ip_info"]["key_id"], json!("k1"));
        assert!(evidence["selected_ip_info"]["hash"].as_str().unwrap().starts_with("0x"));
    }

    #[test]
    fn dropped_events_set_audit_truncated() {
        let mut ctx = base_ctx();
        ctx.dropped = 3;
        let evidence =
            finalize(&ctx, RedactionLevel::Public, PolicyDecision::Allow, NetErrorCode::Allowed, None).unwrap();
        assert_eq!(evidence["audit_truncated"], json!(true));
        assert_eq!(evidence["audit_stats"]["dropped"], json!(3));
    }

    #[test]
    fn digest_excludes_itself_and_is_stable_for_same_input() {
        let ctx = base_ctx();
        let e1 = finalize(&ctx, RedactionLevel::Public, PolicyDecision::Block, NetErrorCode::SsrfDangerousPort, None)
            .unwrap();
        let e2 = finalize(&ctx, RedactionLevel::Public, PolicyDecision::Block, NetErrorCode::SsrfDangerousPort, None)
            .unwrap();
        assert_eq!(e1["evidence_digest"], e2["evidence_digest"]);
    }

    #[test]
    fn block_decision_still_produces_valid_digest() {
        let ctx = base_ctx();
        let evidence = finalize(
            &ctx,
            RedactionLevel::Public,
            PolicyDecision::Block,
            NetErrorCode::SsrfDangerousPort,
            None,
        )
        .unwrap();
        assert_eq!(evidence["policy_decision"], json!("block"));
        let digest = evidence["evidence_digest"].as_str().unwrap();
        assert_eq!(digest.len(), 66);
    }
}
