use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::DrawSummary;

// -- Participants --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterParticipantRequest {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub full_name: String,
    pub delivery_info: String,
    /// `"-"` or an empty string means "no wishes".
    pub gift_wishes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParticipantListItem {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub complete: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipientResponse {
    pub full_name: String,
    pub delivery_info: String,
    pub gift_wishes: Option<String>,
    pub budget: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BudgetResponse {
    pub budget: String,
}

// -- Draws --

#[derive(Debug, Serialize, Deserialize)]
pub struct DrawResponse {
    pub summary: DrawSummary,
    /// Human-readable rendering of `summary`.
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub removed: usize,
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub draw_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
