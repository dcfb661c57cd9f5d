#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt as _;
use peac_gateway::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt as _;

const ISSUER_KID: &str = "test-kid";
const PROVISIONER_KEY: &str = "test-secret";

const CONFIG: &str = r#"{
    "issuer": "https://gateway.example",
    "issuanceApiKey": "test-secret",
    "provisionerKid": "test-kid",
    "provisionerPrivateKeyData": { "value": "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=" }
}"#;

fn make_router() -> axum::Router {
    let state = AppState::mock(CONFIG).unwrap();
    peac_gateway::make_http_service(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = make_router();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn jwks_lists_the_provisioner_key_without_authentication() {
    let app = make_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/.well-known/jwks.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kid"], ISSUER_KID);
    assert_eq!(keys[0]["kty"], "OKP");
    assert_eq!(keys[0]["crv"], "Ed25519");
}

fn issue_request(amt: u64) -> Request<Body> {
    let payload = json!({
        "aud": "https://merchant.example",
        "amt": amt,
        "cur": "USD",
        "rail": "stripe",
        "reference": "pi_123",
    });

    Request::builder()
        .method("POST")
        .uri("/receipts")
        .header(http::header::CONTENT_TYPE, "application/json")
        .header("X-Provisioner-Key", PROVISIONER_KEY)
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn issuance_without_the_provisioner_key_is_rejected() {
    let app = make_router();

    let payload = json!({ "aud": "https://merchant.example", "amt": 100, "cur": "USD", "rail": "stripe", "reference": "pi_1" });
    let request = Request::builder()
        .method("POST")
        .uri("/receipts")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn issue_then_verify_round_trip() {
    let app = make_router();

    let response = app.clone().oneshot(issue_request(4200)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let header_jws = response
        .headers()
        .get("PEAC-Receipt")
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .to_owned();

    let body = body_json(response).await;
    assert_eq!(body["peac_receipt"].as_str().unwrap(), header_jws);
    assert_eq!(body["claims"]["amt"], 4200);
    assert_eq!(body["claims"]["payment"]["amount"], 4200);

    let verify_request = Request::builder()
        .method("POST")
        .uri("/receipts/verify")
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::AUTHORIZATION, format!("Bearer {header_jws}"))
        .body(Body::from(serde_json::to_vec(&json!({})).unwrap()))
        .unwrap();

    let response = app.oneshot(verify_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["kid"], ISSUER_KID);
}

#[tokio::test]
async fn verifying_the_same_receipt_twice_is_a_replay() {
    let app = make_router();

    let response = app.clone().oneshot(issue_request(500)).await.unwrap();
    let header_jws = response
        .headers()
        .get("PEAC-Receipt")
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .to_owned();
    // Drain the issuance body so the connection can be reused by the clones below.
    let _ = response.into_body().collect().await.unwrap();

    let verify = || {
        Request::builder()
            .method("POST")
            .uri("/receipts/verify")
            .header(http::header::AUTHORIZATION, format!("Bearer {header_jws}"))
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json!({})).unwrap()))
            .unwrap()
    };

    let first = app.clone().oneshot(verify()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(verify()).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}
