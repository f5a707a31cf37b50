//! Web server module for handling inbound webhooks.
//!
//! This module provides the HTTP surface:
//! - `GET /` and `GET /api/health` for liveness
//! - `POST /api/echo` for round-tripping JSON
//! - `POST /webhook` for signed webhook deliveries
//!
//! Everything else answers 404 with a JSON error body.

pub mod error;
pub mod forwarded;
pub mod handlers;
pub mod signature;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::ApiError;
pub use forwarded::ForwardedInfo;
pub use handlers::{
    echo, health, not_found, root, webhook, AppState, EchoResponse, HealthResponse,
    RootResponse, WebhookResponse,
};
pub use signature::{
    is_signature_verification_enabled, sign_payload, validate_signature, SIGNATURE_HEADER,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/", get(root).fallback(not_found))
        .route("/api/health", get(health).fallback(not_found))
        .route("/api/echo", post(echo).fallback(not_found))
        .route("/webhook", post(webhook).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
