//! POST /search — runs one cross-modal search or pagination call.

use std::sync::Arc;

use axum::{Json, extract::State};
use retrieval::RawSearchRequest;
use tracing::debug;

use crate::{
    core::{app_state::AppState, extract::ApiJson},
    error_handler::AppError,
    routes::search::search_request::SearchResponse,
};

/// Handler: POST /search
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/search \
///   -H 'content-type: application/json' \
///   -d '{"query_text":"red bicycle","modalities":["text","image"],"limit":5}'
/// ```
pub async fn search(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<RawSearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    debug!(
        target: "api::search",
        modalities = body.modalities.len(),
        has_cursor = body.cursor.is_some(),
        "search request"
    );
    let outcome = state.engine.search(&body).await?;
    Ok(Json(SearchResponse::from(&outcome)))
}
