//! HTTP transport for GitHub webhook deliveries.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::hook::HookEnvelope;
use crate::pipeline::Pipeline;

type HmacSha256 = Hmac<Sha256>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline handling decoded envelopes.
    pub pipeline: Arc<Pipeline>,
    /// Webhook signing secret; verification is skipped when unset.
    pub webhook_secret: Option<String>,
}

/// Build the HTTP router for the dispatcher.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/github", post(github_webhook_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle a GitHub webhook delivery.
///
/// One delivery is one pipeline invocation. Lint runs outlast GitHub's
/// delivery timeout, so the invocation is detached and the delivery
/// acknowledged immediately.
async fn github_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let delivery_id = headers
        .get("X-GitHub-Delivery")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    info!(
        event_type = %event_type,
        delivery_id = %delivery_id,
        "Received GitHub webhook"
    );

    if let Some(secret) = &state.webhook_secret {
        let signature = headers
            .get("X-Hub-Signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !verify_webhook_signature(&body, signature, secret) {
            warn!(delivery_id = %delivery_id, "Webhook signature verification failed");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    if event_type != "push" && event_type != "pull_request" {
        debug!(event_type = %event_type, "Ignoring unsupported event");
        return Ok(Json(json!({
            "status": "ignored",
            "reason": "unsupported_event"
        })));
    }

    let envelope: HookEnvelope = serde_json::from_slice(&body).map_err(|e| {
        error!(error = %e, "Failed to parse GitHub webhook payload");
        StatusCode::BAD_REQUEST
    })?;

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline.handle(&envelope).await;
    });

    Ok(Json(json!({"status": "accepted"})))
}

/// Verify a GitHub webhook signature using HMAC-SHA256.
///
/// The `X-Hub-Signature-256` header carries `sha256=<hex digest>`.
#[must_use]
pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let Some(signature) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(signature_bytes) = hex::decode(signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    // Constant-time comparison to prevent timing attacks
    computed.as_slice().ct_eq(&signature_bytes).into()
}

async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn readiness_check() -> Json<Value> {
    Json(json!({"status": "ready"}))
}
