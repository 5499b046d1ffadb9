use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// `GET /health` - liveness check.
///
/// Always `200 OK`; an unconfigured source narrows comparisons but does not
/// make the service unhealthy.
///
/// Response shape:
/// ```json
/// { "status": "ok", "version": "0.1.0", "sources": ["primary_ads"] }
/// ```
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "sources": state.enabled_sources(),
        })),
    )
}
