//! GET /bundle/{session_id} — returns the session's latest rendered bundle.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use retrieval::Modality;
use serde::Serialize;

use crate::{core::app_state::AppState, error_handler::AppError};

/// Response payload for GET /bundle/{session_id}.
#[derive(Debug, Serialize)]
pub struct BundleResponse {
    pub session_id: String,
    pub turn: u64,
    /// Citation-tagged bundle text; markers correspond 1:1 to the results
    /// of the search call that produced it.
    pub bundle: String,
    pub omitted_count: usize,
    /// Modalities actually represented in the bundle.
    pub modalities: Vec<Modality>,
    pub char_count: usize,
}

pub async fn bundle(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<BundleResponse>, AppError> {
    let view = state
        .engine
        .bundle(&session_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(BundleResponse {
        session_id: view.session_id,
        turn: view.turn,
        char_count: view.text.len(),
        bundle: view.text,
        omitted_count: view.omitted,
        modalities: view.modalities,
    }))
}
