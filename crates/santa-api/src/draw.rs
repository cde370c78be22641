use axum::{
    Json,
    extract::{Query, State},
};

use santa_draw::message;
use santa_types::api::{ClearResponse, DrawResponse, LedgerQuery};
use santa_types::models::{DeliveryOutcome, DrawSummary};

use crate::error::ApiError;
use crate::state::{AppState, blocking};

fn respond(summary: DrawSummary) -> Json<DrawResponse> {
    Json(DrawResponse {
        message: message::render_summary(&summary),
        summary,
    })
}

pub async fn run_draw(State(state): State<AppState>) -> Result<Json<DrawResponse>, ApiError> {
    Ok(respond(state.orchestrator.run_draw().await?))
}

pub async fn restart_draw(State(state): State<AppState>) -> Result<Json<DrawResponse>, ApiError> {
    Ok(respond(state.orchestrator.restart_draw().await?))
}

/// Notify every giver of the stored set again.
pub async fn resend_notifications(State(state): State<AppState>) -> Result<Json<DrawResponse>, ApiError> {
    Ok(respond(state.orchestrator.resend_notifications().await?))
}

pub async fn clear_assignments(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    let removed = state.orchestrator.clear_assignments().await?;
    Ok(Json(ClearResponse { removed }))
}

pub async fn ledger(
    State(state): State<AppState>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<Vec<DeliveryOutcome>>, ApiError> {
    let outcomes = blocking(&state, move |db| db.list_outcomes(query.draw_id)).await?;
    Ok(Json(outcomes))
}
