use axum::{
    Json,
    extract::{Path, State},
};

use santa_draw::message;
use santa_types::models::ResolvedPair;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ResolvedPair>>, ApiError> {
    Ok(Json(state.orchestrator.list_assignments().await?))
}

/// The pair in which the participant with internal id `participant_id` gives.
pub async fn get_for(
    State(state): State<AppState>,
    Path(participant_id): Path<i64>,
) -> Result<Json<ResolvedPair>, ApiError> {
    state
        .orchestrator
        .assignment_for(participant_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no assignment for participant {}", participant_id)))
}

/// Plain-text pair listing for the admin chat.
pub async fn pairs_text(State(state): State<AppState>) -> Result<String, ApiError> {
    let pairs = state.orchestrator.list_assignments().await?;
    Ok(message::render_pairs(&pairs))
}
