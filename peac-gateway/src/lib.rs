#[macro_use]
extern crate tracing;

pub mod config;
pub mod extract;
pub mod http;
pub mod log;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod tasks;

use axum::routing::{get, post};
use axum::Router;

pub use state::AppState;

/// Assembles the full HTTP surface over a given state: routing, auth,
/// logging, and CORS. Shared between the real server entrypoint and
/// integration tests so both exercise identical wiring.
pub fn make_http_service(state: AppState) -> Router<()> {
    Router::new()
        .route("/health", get(routes::health))
        .route("/.well-known/jwks.json", get(routes::jwks))
        .route("/receipts", post(routes::issue_receipt))
        .route("/receipts/verify", post(routes::verify_receipt))
        .layer(axum::middleware::from_fn(middleware::log::log_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth::auth_middleware))
        .layer(middleware::cors::make_middleware())
        .with_state(state)
}
