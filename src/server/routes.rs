//! Axum route handlers for the credential relay.
//!
//! # Routes
//!
//! - `GET  /health`: Returns `{"status": "ok", "version": .., "service": "action-node"}`
//! - `POST /authorize/:system_name`: Relays an authorization blob to the store

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::credentials::{CredentialError, CredentialRelay, SaveOutcome};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<CredentialRelay>,
}

impl AppState {
    pub fn new(relay: CredentialRelay) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/authorize/:system_name", post(authorize_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health: liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "action-node",
    }))
}

/// POST /authorize/:system_name: persist credentials obtained out of band.
async fn authorize_handler(
    State(state): State<AppState>,
    Path(system_name): Path<String>,
    Json(authorization_data): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let outcome = state.relay.save(&system_name, &authorization_data).await;
    if let Err(e) = &outcome {
        log::error!("saving authorization data for {} failed: {}", system_name, e);
    }
    let (status, detail) = relay_response(&outcome);
    (status, Json(json!({ "detail": detail })))
}

/// Map a relay outcome to the status and detail returned to the caller.
fn relay_response(outcome: &Result<SaveOutcome, CredentialError>) -> (StatusCode, &'static str) {
    match outcome {
        Ok(SaveOutcome::Saved) => (StatusCode::OK, "Authorization successful and data saved."),
        Ok(SaveOutcome::Created) => (
            StatusCode::CREATED,
            "Authorization successful and new data created.",
        ),
        Err(CredentialError::Upstream { status, .. }) => match *status {
            400 => (StatusCode::BAD_REQUEST, "Bad request: invalid authorization data."),
            401 => (StatusCode::UNAUTHORIZED, "Unauthorized: invalid access token."),
            403 => (StatusCode::FORBIDDEN, "Forbidden: access to the store was denied."),
            404 => (StatusCode::NOT_FOUND, "Not found: the authorization store is unavailable."),
            _ => (
                StatusCode::BAD_GATEWAY,
                "Authorization store failed to save the data.",
            ),
        },
        Err(CredentialError::Encode(_) | CredentialError::Http(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not relay authorization data.",
        ),
    }
}
