pub mod link_preview;

use axum::{http::StatusCode, http::Uri, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Build the public router. Every response, including errors and unknown
/// paths, is JSON and carries a permissive CORS policy.
pub fn router(state: AppState) -> Router {
    with_middleware(routes(state))
}

/// Routes without middleware, so callers can mount extra endpoints
/// (e.g. `/metrics`) before [`with_middleware`] is applied.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/preview",
            get(link_preview::get_preview).fallback(link_preview::method_not_allowed),
        )
        .fallback(not_found)
        .with_state(state)
}

pub fn with_middleware(app: Router) -> Router {
    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn health_check() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "link-preview-server",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
