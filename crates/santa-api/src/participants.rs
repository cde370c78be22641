use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use santa_db::{DeleteParticipant, NewParticipant};
use santa_draw::message;
use santa_types::api::{BudgetResponse, ParticipantListItem, RecipientResponse, RegisterParticipantRequest};

use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// Register, or update the profile of an already registered chat id.
/// Returns 201 for a new participant and 200 for an update.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterParticipantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = req.full_name.trim().to_string();
    let delivery_info = req.delivery_info.trim().to_string();
    if full_name.is_empty() {
        return Err(ApiError::BadRequest("full_name must not be empty".into()));
    }
    if delivery_info.is_empty() {
        return Err(ApiError::BadRequest("delivery_info must not be empty".into()));
    }

    // "-" is how people say "no wishes".
    let gift_wishes = req
        .gift_wishes
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty() && w != "-");
    let is_admin = state.admin_telegram_id == Some(req.telegram_id);

    let (created, participant) = blocking(&state, move |db| {
        let existed = db.get_participant_by_telegram_id(req.telegram_id)?.is_some();
        let participant = db.upsert_participant(&NewParticipant {
            telegram_id: req.telegram_id,
            username: req.username.as_deref(),
            first_name: &req.first_name,
            last_name: req.last_name.as_deref(),
            full_name: &full_name,
            delivery_info: &delivery_info,
            gift_wishes: gift_wishes.as_deref(),
            is_admin,
        })?;
        Ok((!existed, participant))
    })
    .await?;

    if created {
        info!("Registered participant TG {}", participant.telegram_id);
        Ok((StatusCode::CREATED, Json(participant)))
    } else {
        info!("Updated participant TG {}", participant.telegram_id);
        Ok((StatusCode::OK, Json(participant)))
    }
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ParticipantListItem>>, ApiError> {
    let participants = blocking(&state, |db| db.list_participants()).await?;

    Ok(Json(
        participants
            .into_iter()
            .map(|p| ParticipantListItem {
                complete: p.is_complete(),
                id: p.id,
                telegram_id: p.telegram_id,
                username: p.username,
                full_name: p.full_name,
            })
            .collect(),
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(telegram_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    match blocking(&state, move |db| db.delete_participant_by_telegram_id(telegram_id)).await? {
        DeleteParticipant::Deleted => {
            info!("Removed participant TG {}", telegram_id);
            Ok(StatusCode::NO_CONTENT)
        }
        DeleteParticipant::NotFound => Err(ApiError::NotFound(format!(
            "no participant with TG id {}",
            telegram_id
        ))),
        DeleteParticipant::InCurrentDraw => Err(ApiError::Conflict(format!(
            "TG {} is part of the current draw; clear the assignments first",
            telegram_id
        ))),
    }
}

pub async fn my_recipient(
    State(state): State<AppState>,
    Path(telegram_id): Path<i64>,
) -> Result<Json<RecipientResponse>, ApiError> {
    let (participant, pair) = blocking(&state, move |db| {
        let participant = db.get_participant_by_telegram_id(telegram_id)?;
        let pair = match participant {
            Some(_) => db.assignment_for_telegram_id(telegram_id)?,
            None => None,
        };
        Ok((participant, pair))
    })
    .await?;

    if participant.is_none() {
        return Err(ApiError::NotFound("you are not registered yet, register first".into()));
    }
    let pair = pair.ok_or_else(|| ApiError::NotFound("the draw has not taken place yet".into()))?;

    let budget = state.orchestrator.budget().to_string();
    let receiver = pair.receiver;
    Ok(Json(RecipientResponse {
        message: message::recipient_card(&receiver, &budget),
        full_name: receiver.full_name,
        delivery_info: receiver.delivery_info,
        gift_wishes: receiver.gift_wishes,
        budget,
    }))
}

pub async fn budget(State(state): State<AppState>) -> Json<BudgetResponse> {
    Json(BudgetResponse {
        budget: state.orchestrator.budget().to_string(),
    })
}
