use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use santa_draw::DrawError;
use santa_types::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Draw(#[from] DrawError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Draw(DrawError::InsufficientParticipants { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Draw(DrawError::NoAssignments) => StatusCode::CONFLICT,
            Self::Draw(DrawError::GenerationExhausted { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Draw(DrawError::Storage { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) => error!("Request failed: {:#}", e),
            Self::Draw(e) if e.is_aborted() => error!("Draw aborted: {}", e),
            _ => {}
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
