use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order:
///
/// 1. `TraceLayer` - structured request/response logging via `tracing`.
/// 2. `CorsLayer` - permissive CORS so dashboards on other origins can read
///    the comparison.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/conversions/validate",
            get(routes::validate::validate_conversions),
        )
        .route(
            "/api/conversions/validate/export",
            get(routes::export::export_comparison),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
