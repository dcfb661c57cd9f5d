use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::HttpError;
use crate::state::AppState;

struct AuthException {
    method: Method,
    path: &'static str,
}

/// Routes that never require the issuance credential. Verification and
/// JWKS are meant to be checked by anyone holding a receipt, not just the
/// gateway's own operator — only minting a new receipt is privileged.
const AUTH_EXCEPTIONS: &[AuthException] = &[
    AuthException {
        method: Method::GET,
        path: "/health",
    },
    AuthException {
        method: Method::GET,
        path: "/.well-known/jwks.json",
    },
    AuthException {
        method: Method::POST,
        path: "/receipts/verify",
    },
];

pub async fn auth_middleware(State(state): State<AppState>, request: Request<Body>, next: Next) -> Result<Response, HttpError> {
    let method = request.method().clone();
    let uri_path = request.uri().path().to_owned();

    let skip_authentication = AUTH_EXCEPTIONS
        .iter()
        .any(|exception| exception.method == method && exception.path == uri_path);

    if skip_authentication {
        trace!("unauthenticated route");
        return Ok(next.run(request).await);
    }

    let conf = state.conf_handle.get_conf();

    let Some(expected_key) = conf.issuance_api_key.as_deref() else {
        // No credential configured: issuance is open. Only acceptable for local/dev use.
        return Ok(next.run(request).await);
    };

    let provided = request.headers().get("X-Provisioner-Key").and_then(|value| value.to_str().ok());

    match provided {
        Some(provided) if constant_time_eq(provided.as_bytes(), expected_key.as_bytes()) => Ok(next.run(request).await),
        _ => Err(HttpError::unauthorized().msg("missing or invalid X-Provisioner-Key")),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
