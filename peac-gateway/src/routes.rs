use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use peac_receipt_core::issuer::{issue, IssueRequest};
use peac_receipt_core::verifier::{KeyResolver, VerifyError, Verifier};
use peac_safe_fetch::{attach_receipt, Attachment, TransportPolicy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::extract::ReceiptToken;
use crate::http::HttpError;
use crate::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct Jwk {
    kty: &'static str,
    crv: &'static str,
    x: String,
    kid: String,
}

#[derive(Debug, Serialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

pub async fn jwks(State(state): State<AppState>) -> Json<JwkSet> {
    let conf = state.conf_handle.get_conf();

    let keys = conf
        .verification_keys
        .iter()
        .map(|(kid, key)| Jwk {
            kty: "OKP",
            crv: "Ed25519",
            x: peac_base64::encode(key.as_bytes()),
            kid: kid.clone(),
        })
        .collect();

    Json(JwkSet { keys })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReceiptBody {
    pub aud: String,
    pub amt: u64,
    pub cur: String,
    pub rail: String,
    pub reference: String,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub env: Option<peac_receipt_core::Environment>,
    #[serde(default)]
    pub evidence: Option<Value>,
    #[serde(default)]
    pub subject: Option<Value>,
    #[serde(default)]
    pub exp: Option<u64>,
}

pub async fn issue_receipt(State(state): State<AppState>, Json(body): Json<IssueReceiptBody>) -> Result<Response, HttpError> {
    let conf = state.conf_handle.get_conf();

    let signing_key = conf
        .provisioner_signing_key
        .as_ref()
        .ok_or_else(|| HttpError::internal().msg("this gateway holds no provisioner private key and cannot issue receipts"))?;

    let request = IssueRequest {
        iss: conf.issuer.clone(),
        aud: body.aud,
        amt: body.amt,
        cur: body.cur,
        rail: body.rail,
        reference: body.reference,
        asset: body.asset,
        env: body.env,
        evidence: body.evidence,
        subject: body.subject,
        ext: None,
        exp: body.exp,
        kid: conf.provisioner_kid.clone(),
    };

    let issued = issue(&request, signing_key).map_err(HttpError::bad_request().err())?;

    if conf.debug.dump_receipts {
        debug!(jws = %issued.jws, "**DEBUG OPTION**");
    }

    let claims_json = serde_json::to_value(&issued.claims).expect("ReceiptClaims always serializes");
    let attachment = attach_receipt(&issued.jws, &claims_json, &TransportPolicy::default(), None)
        .map_err(HttpError::internal().err())?;

    let body = json!({ "claims": issued.claims, "peac_receipt": issued.jws });

    Ok(match attachment {
        Attachment::Header { name, value } => {
            let mut response = (StatusCode::CREATED, Json(body)).into_response();
            response.headers_mut().insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(&value).map_err(HttpError::internal().err())?,
            );
            response
        }
        Attachment::Body { .. } | Attachment::Pointer { .. } => (StatusCode::CREATED, Json(body)).into_response(),
    })
}

#[derive(Debug, Deserialize, Default)]
pub struct VerifyReceiptBody {
    #[serde(default)]
    pub peac_receipt: Option<String>,
}

struct MapResolver<'a>(&'a std::collections::HashMap<String, ed25519_dalek::VerifyingKey>);

impl KeyResolver for MapResolver<'_> {
    fn resolve(&self, kid: &str) -> Option<ed25519_dalek::VerifyingKey> {
        self.0.get(kid).copied()
    }
}

pub async fn verify_receipt(
    State(state): State<AppState>,
    token: Option<ReceiptToken>,
    Json(body): Json<VerifyReceiptBody>,
) -> Result<Json<Value>, HttpError> {
    let jws = token
        .map(|ReceiptToken(jws)| jws)
        .or(body.peac_receipt)
        .ok_or_else(|| HttpError::bad_request().msg("no receipt provided (bearer, PEAC-Receipt header, or peac_receipt body field)"))?;

    let conf = state.conf_handle.get_conf();
    let resolver = MapResolver(&conf.verification_keys);

    let verifier = match conf.expected_audience.as_deref() {
        Some(aud) => Verifier::builder().resolver(&resolver).replay_cache(&state.replay_cache).expected_audience(aud).build(),
        None => Verifier::builder().resolver(&resolver).replay_cache(&state.replay_cache).build(),
    };

    match verifier.verify(&jws) {
        Ok(verified) => Ok(Json(json!({ "valid": true, "claims": verified.claims, "kid": verified.jws_header_kid }))),
        Err(error) => Err(map_verify_error(error)),
    }
}

fn map_verify_error(error: VerifyError) -> HttpError {
    match &error {
        VerifyError::AudienceMismatch => HttpError::forbidden().err()(error),
        VerifyError::Replay => crate::http::HttpErrorBuilder::new(StatusCode::CONFLICT).err()(error),
        _ => HttpError::unauthorized().err()(error),
    }
}
