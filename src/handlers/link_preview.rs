use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extract::extract;
use crate::models::PreviewResult;
use crate::state::AppState;

// ── Query params ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub url: Option<String>,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /preview?url=<encoded-url>
///
/// Fetches the page once and returns its preview card. Missing fields fall
/// back to configured defaults; only fetch problems produce an error body.
pub async fn get_preview(
    State(state): State<AppState>,
    query: Result<Query<PreviewQuery>, QueryRejection>,
) -> AppResult<Json<PreviewResult>> {
    let Query(params) = query.map_err(|e| AppError::InvalidUrl(e.body_text()))?;

    // `source_url` echoes the parameter exactly as sent; only the fetch
    // sees the trimmed form.
    let source_url = params
        .url
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::InvalidUrl("URL parameter is required".into()))?;

    let page = state.fetcher.fetch(source_url.trim()).await?;

    // Parsing is CPU-bound; keep it off the async workers. A panic in the
    // parser surfaces as a JoinError instead of taking the request down.
    let config = state.extract.clone();
    let result = tokio::task::spawn_blocking(move || {
        extract(&page.body, &page.final_url, &source_url, &config)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = ?e, "Preview extraction task failed");
        AppError::Internal("Failed to parse upstream page".into())
    })?;

    Ok(Json(result))
}

/// Any method other than GET/HEAD on `/preview`.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
