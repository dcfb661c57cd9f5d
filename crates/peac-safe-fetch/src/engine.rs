//! The Safe Fetch Engine: `VALIDATE_URL → RESOLVE_DNS → CLASSIFY_IPS →
//! PIN_IP → CONNECT → SEND → RECEIVE_HEADERS → {REDIRECT|READ_BODY} →
//! FINALIZE`, re-entered from the top for every redirect hop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, Url};
use serde_json::Value;

use peac_dns_pin::{pin_answers, PinPolicy, Resolve};
use peac_net_guard::{check_url, GuardPolicy, NetErrorCode};

use crate::audit::{AuditEvent, AuditEventType, AuditQueue};
use crate::error::FetchError;
use crate::evidence::{self, DnsAnswerRecord, EvidenceContext, PolicyDecision, RedactionKey, RedactionLevel, SelectedIp};
use crate::redirect::{self, RedirectPolicy};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 2 * 1024 * 1024;
pub const MAX_JWKS_RESPONSE_BYTES: u64 = 512 * 1024;

const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    pub dns_ms: u64,
    pub connect_ms: u64,
    pub headers_ms: u64,
    pub body_ms: u64,
    pub total_ms: u64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            dns_ms: DEFAULT_TIMEOUT_MS,
            connect_ms: DEFAULT_TIMEOUT_MS,
            headers_ms: DEFAULT_TIMEOUT_MS,
            body_ms: DEFAULT_TIMEOUT_MS,
            total_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl TimeoutPolicy {
    /// Legacy single-knob constructor: `timeoutMs` maps onto `totalMs` only.
    pub fn from_legacy_timeout_ms(timeout_ms: u64) -> Self {
        Self { total_ms: timeout_ms, ..Self::default() }
    }
}

#[derive(Clone)]
pub struct FetchPolicy {
    pub guard: GuardPolicy,
    pub pin: PinPolicy,
    pub allowed_methods: Vec<Method>,
    pub allow_compression: bool,
    pub max_response_bytes: u64,
    pub max_redirects: u32,
    pub redirect_policy: RedirectPolicy,
    pub timeouts: TimeoutPolicy,
    pub evidence_level: RedactionLevel,
    pub redaction_key: Option<(Vec<u8>, String)>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            guard: GuardPolicy::default(),
            pin: PinPolicy::default(),
            allowed_methods: vec![Method::GET, Method::HEAD],
            allow_compression: false,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            redirect_policy: RedirectPolicy::None,
            timeouts: TimeoutPolicy::default(),
            evidence_level: RedactionLevel::Public,
            redaction_key: None,
        }
    }
}

pub struct FetchOutcome {
    pub status: u16,
    pub headers: reqwest::header::HeaderMap,
    pub body: Bytes,
    pub evidence: Value,
}

fn strip_hop_by_hop(headers: &mut reqwest::header::HeaderMap) {
    let connection_named: Vec<String> = headers
        .get_all(reqwest::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(',').map(|s| s.trim().to_ascii_lowercase()))
        .collect();

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
    for name in connection_named {
        headers.remove(name.as_str());
    }
}

fn inject_accept_encoding(headers: &mut reqwest::header::HeaderMap, allow_compression: bool) {
    if headers.contains_key(reqwest::header::ACCEPT_ENCODING) {
        return;
    }
    if !allow_compression {
        headers.insert(reqwest::header::ACCEPT_ENCODING, reqwest::header::HeaderValue::from_static("identity"));
    }
}

fn redaction_key_ref(policy: &FetchPolicy) -> Option<RedactionKey<'_>> {
    policy.redaction_key.as_ref().map(|(key, key_id)| RedactionKey { key, key_id })
}

struct HopResult {
    response: reqwest::Response,
    selected_ip: SelectedIp,
    dns_answers: Vec<DnsAnswerRecord>,
}

/// Runs `VALIDATE_URL → RESOLVE_DNS → CLASSIFY_IPS → PIN_IP → CONNECT → SEND
/// → RECEIVE_HEADERS` for a single hop, pinning the connection to the one IP
/// chosen by DNS resolution.
async fn run_hop(
    url: &Url,
    method: Method,
    headers: reqwest::header::HeaderMap,
    resolver: &dyn Resolve,
    policy: &FetchPolicy,
    audit: &AuditQueue,
) -> Result<HopResult, FetchError> {
    // VALIDATE_URL
    let admitted = check_url(url.as_str(), &policy.guard)?;

    // RESOLVE_DNS / CLASSIFY_IPS / PIN_IP
    let (pinned_ip, dns_answers) = if admitted.is_ip_literal {
        let ip: std::net::IpAddr = admitted.host.trim_start_matches('[').trim_end_matches(']').parse()
            .map_err(|_| FetchError::from(NetErrorCode::SsrfUrlRejected))?;
        (ip, Vec::new())
    } else {
        audit.emit(AuditEvent::new(AuditEventType::DnsStart, url.as_str(), None));
        let answers = tokio::time::timeout(Duration::from_millis(policy.timeouts.dns_ms), resolver.resolve_all(&admitted.host))
            .await
            .map_err(|_| FetchError::from(NetErrorCode::DnsTimeout))??;
        audit.emit(AuditEvent::new(
            AuditEventType::DnsResult,
            url.as_str(),
            Some(serde_json::json!({ "ipv4": answers.ipv4.len(), "ipv6": answers.ipv6.len() })),
        ));
        let records: Vec<DnsAnswerRecord> = answers
            .ipv6
            .iter()
            .copied()
            .map(std::net::IpAddr::V6)
            .chain(answers.ipv4.iter().copied().map(std::net::IpAddr::V4))
            .map(|ip| DnsAnswerRecord { ip, blocked_reason: None })
            .collect();
        let pinned = pin_answers(&answers, &policy.pin)?;
        (pinned.ip, records)
    };

    let family = if pinned_ip.is_ipv4() { 4 } else { 6 };

    // CONNECT / SEND
    audit.emit(AuditEvent::new(AuditEventType::ConnectStart, url.as_str(), None));
    let socket_addr = SocketAddr::new(pinned_ip, admitted.port);
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_millis(policy.timeouts.connect_ms))
        .timeout(Duration::from_millis(policy.timeouts.total_ms))
        .resolve(&admitted.host, socket_addr)
        .build()
        .map_err(FetchError::from)?;

    let mut request_headers = headers;
    strip_hop_by_hop(&mut request_headers);
    inject_accept_encoding(&mut request_headers, policy.allow_compression);

    let response = tokio::time::timeout(
        Duration::from_millis(policy.timeouts.headers_ms),
        client.request(method, url.clone()).headers(request_headers).send(),
    )
    .await
    .map_err(|_| FetchError::from(NetErrorCode::RequestTimeout))??;

    audit.emit(AuditEvent::new(
        AuditEventType::ResponseHeaders,
        url.as_str(),
        Some(serde_json::json!({ "status": response.status().as_u16() })),
    ));

    Ok(HopResult { response, selected_ip: SelectedIp { ip: pinned_ip, family }, dns_answers })
}

/// Reads the body with the size budget enforced: a `Content-Length` over
/// budget rejects before any read; otherwise bytes are accumulated chunk by
/// chunk and the read aborts the moment the budget is exceeded.
async fn read_body_with_budget(
    mut response: reqwest::Response,
    max_bytes: u64,
    body_timeout_ms: u64,
) -> Result<Bytes, FetchError> {
    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(FetchError::from(NetErrorCode::ResponseTooLarge));
        }
    }

    let mut buf = Vec::new();
    let deadline = tokio::time::sleep(Duration::from_millis(body_timeout_ms));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            chunk = response.chunk() => {
                match chunk.map_err(FetchError::from)? {
                    Some(bytes) => {
                        buf.extend_from_slice(&bytes);
                        if buf.len() as u64 > max_bytes {
                            return Err(FetchError::from(NetErrorCode::ResponseTooLarge));
                        }
                    }
                    None => break,
                }
            }
            () = &mut deadline => return Err(FetchError::from(NetErrorCode::RequestTimeout)),
        }
    }

    Ok(Bytes::from(buf))
}

/// Runs the full state machine, including redirect re-entry, and returns
/// the finalized body plus sealed evidence.
pub async fn safe_fetch(
    url: &str,
    method: Method,
    headers: reqwest::header::HeaderMap,
    resolver: Arc<dyn Resolve>,
    policy: &FetchPolicy,
    audit: &AuditQueue,
) -> Result<FetchOutcome, FetchError> {
    if !policy.allowed_methods.contains(&method) {
        return Err(FetchError::from(NetErrorCode::MethodNotAllowed));
    }

    let mut current_url = Url::parse(url).map_err(|_| FetchError::from(NetErrorCode::SsrfUrlRejected))?;
    let mut redirects = 0u32;

    loop {
        let mut ctx = EvidenceContext {
            request_url: current_url.to_string(),
            max_response_bytes: policy.max_response_bytes,
            ..EvidenceContext::default()
        };
        if let Some(host) = current_url.host_str() {
            ctx.canonical_host = host.to_owned();
        }

        let hop = match run_hop(&current_url, method.clone(), headers.clone(), resolver.as_ref(), policy, audit).await
        {
            Ok(hop) => hop,
            Err(err) => {
                audit.emit(AuditEvent::new(AuditEventType::PolicyBlock, current_url.as_str(), None));
                tracing::warn!(decision_code = err.code.as_str(), url = current_url.as_str(), "safe fetch blocked");
                return Err(err);
            }
        };

        ctx.selected_ip = Some(hop.selected_ip);
        ctx.dns_answers = hop.dns_answers;
        ctx.is_ip_literal = current_url
            .host_str()
            .and_then(|h| h.trim_start_matches('[').trim_end_matches(']').parse::<std::net::IpAddr>().ok())
            .is_some();

        let status = hop.response.status();
        if status.is_redirection() {
            let location = hop
                .response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or(FetchError::from(NetErrorCode::ParseError))?;
            let target = current_url.join(location).map_err(|_| FetchError::from(NetErrorCode::ParseError))?;

            redirects += 1;
            if redirects > policy.max_redirects {
                audit.emit(AuditEvent::new(AuditEventType::PolicyBlock, target.as_str(), None));
                return Err(FetchError::from(NetErrorCode::SsrfTooManyRedirects));
            }

            if let Err(code) = redirect::check(&current_url, &target, &policy.redirect_policy) {
                audit.emit(AuditEvent::new(AuditEventType::PolicyBlock, target.as_str(), None));
                return Err(FetchError::from(code));
            }

            audit.emit(AuditEvent::new(
                AuditEventType::Redirect,
                current_url.as_str(),
                Some(serde_json::json!({ "to": target.as_str() })),
            ));
            current_url = target;
            continue;
        }

        let response_headers = hop.response.headers().clone();
        let body =
            read_body_with_budget(hop.response, policy.max_response_bytes, policy.timeouts.body_ms).await?;

        let evidence = evidence::finalize(
            &ctx,
            policy.evidence_level,
            PolicyDecision::Allow,
            NetErrorCode::Allowed,
            redaction_key_ref(policy).as_ref(),
        )
        .map_err(FetchError::from)?;

        return Ok(FetchOutcome { status: status.as_u16(), headers: response_headers, body, evidence });
    }
}

/// Like [`safe_fetch`], but always returns the evidence object, even for a
/// blocked or failed request.
pub async fn safe_fetch_with_evidence(
    url: &str,
    method: Method,
    headers: reqwest::header::HeaderMap,
    resolver: Arc<dyn Resolve>,
    policy: &FetchPolicy,
    audit: &AuditQueue,
) -> (Result<FetchOutcome, FetchError>, Value) {
    match safe_fetch(url, method, headers, resolver, policy, audit).await {
        Ok(outcome) => {
            let evidence = outcome.evidence.clone();
            (Ok(outcome), evidence)
        }
        Err(err) => {
            let ctx = EvidenceContext { request_url: url.to_owned(), max_response_bytes: policy.max_response_bytes, ..EvidenceContext::default() };
            let evidence = evidence::finalize(&ctx, policy.evidence_level, PolicyDecision::Block, err.code, redaction_key_ref(policy).as_ref())
                .unwrap_or_else(|_| Value::Null);
            (Err(err), evidence)
        }
    }
}

/// Raw body surface: caller receives the response plus a handle that
/// *must* be closed. Connection teardown on drop is a safety net, not a
/// substitute for calling [`RawHandle::close`].
pub struct RawHandle {
    response: Option<reqwest::Response>,
}

impl RawHandle {
    pub fn close(mut self) {
        self.response.take();
    }

    /// Consumes the handle and returns the chunked body stream. Once the
    /// stream is exhausted (or dropped) the underlying connection is
    /// released the same as an explicit [`close`](Self::close) would do.
    pub fn into_stream(mut self) -> Option<impl futures_util::Stream<Item = reqwest::Result<Bytes>>> {
        self.response.take().map(reqwest::Response::bytes_stream)
    }
}

pub async fn safe_fetch_raw(
    url: &str,
    method: Method,
    headers: reqwest::header::HeaderMap,
    resolver: Arc<dyn Resolve>,
    policy: &FetchPolicy,
    audit: &AuditQueue,
) -> Result<RawHandle, FetchError> {
    let current_url = Url::parse(url).map_err(|_| FetchError::from(NetErrorCode::SsrfUrlRejected))?;
    let hop = run_hop(&current_url, method, headers, resolver.as_ref(), policy, audit).await?;
    Ok(RawHandle { response: Some(hop.response) })
}
