//! HTTP endpoint handlers.
//!
//! JSON bodies are read as raw bytes first so the webhook signature can be
//! checked against exactly what the sender signed, then parsed.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, OriginalUri, State},
    http::{header, HeaderMap},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::web::error::ApiError;
use crate::web::forwarded::ForwardedInfo;
use crate::web::signature::{validate_signature, SIGNATURE_HEADER};
use crate::Config;

/// Version reported by the root endpoint.
pub const API_VERSION: &str = "1.0.0";

/// Acknowledgment message for accepted webhooks.
pub const WEBHOOK_ACK_MESSAGE: &str = "Webhook recebido com sucesso";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// Root & Health
// =============================================================================

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub version: &'static str,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Bem-vindo ao projeto Express!",
        version: API_VERSION,
    })
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: now_iso8601(),
    })
}

// =============================================================================
// Echo
// =============================================================================

#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub received: Value,
}

/// Echo back whatever JSON was posted.
pub async fn echo(
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<EchoResponse>, ApiError> {
    let body = body?;
    let received = parse_json_body(&headers, &body)?;

    Ok(Json(EchoResponse { received }))
}

// =============================================================================
// Webhook
// =============================================================================

/// Webhook acknowledgment.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub message: &'static str,
    pub timestamp: String,
    pub origin: String,
    pub url: String,
}

/// Webhook endpoint.
///
/// This endpoint:
/// 1. Rejects oversized or malformed bodies
/// 2. Verifies the HMAC signature (if a secret is configured)
/// 3. Logs the delivery and acknowledges it with origin metadata
pub async fn webhook(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let body = body.map_err(|e| {
        warn!(error = %e, "webhook_body_rejected");
        ApiError::from(e)
    })?;

    let payload = parse_json_body(&headers, &body)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    if !validate_signature(&body, signature, state.config.secret()) {
        warn!(
            has_signature = signature.is_some(),
            body_length = body.len(),
            "webhook_signature_invalid"
        );
        return Err(ApiError::SignatureInvalid);
    }

    let forwarded = ForwardedInfo::from_request(&headers, peer.map(|ConnectInfo(addr)| addr), &uri);
    let timestamp = now_iso8601();

    info!(
        timestamp = %timestamp,
        url = %forwarded.url,
        origin = %forwarded.origin,
        headers = ?headers,
        body = %payload,
        signature_verified = state.config.signature_verification_enabled(),
        "webhook_received"
    );

    Ok(Json(WebhookResponse {
        message: WEBHOOK_ACK_MESSAGE,
        timestamp,
        origin: forwarded.origin,
        url: forwarded.url,
    }))
}

// =============================================================================
// Fallback
// =============================================================================

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

// =============================================================================
// Helpers
// =============================================================================

/// Parse a JSON request body.
///
/// Bodies not declared as JSON are left unparsed and read as `{}`, as is an
/// empty JSON body. Only objects and arrays are accepted at the top level.
pub fn parse_json_body(headers: &HeaderMap, body: &[u8]) -> Result<Value, ApiError> {
    if !is_json_content_type(headers) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
        Ok(_) => Err(ApiError::MalformedBody),
        Err(e) => {
            warn!(error = %e, body_length = body.len(), "json_body_invalid");
            Err(ApiError::MalformedBody)
        }
    }
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Current UTC time as ISO-8601 with millisecond precision, e.g.
/// `2024-05-01T12:00:00.000Z`.
fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
