//! Engine error → HTTP response mapping
//!
//! | RankingError          | Status |
//! |-----------------------|--------|
//! | NotFound              | 404    |
//! | InvalidArgument       | 400    |
//! | OutOfRange            | 400    |
//! | RanksDisabled         | 409    |
//! | TournamentFull        | 409    |
//! | TournamentNotActive   | 409    |
//! | JoinRequired          | 403    |
//! | AttemptsExceeded      | 429    |
//! | Storage               | 500    |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use ladder_core::RankingError;

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub RankingError);

impl From<RankingError> for ApiError {
    fn from(e: RankingError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RankingError::NotFound(_) => StatusCode::NOT_FOUND,
            RankingError::InvalidArgument(_) | RankingError::OutOfRange { .. } => {
                StatusCode::BAD_REQUEST
            }
            RankingError::RanksDisabled(_)
            | RankingError::TournamentFull(_)
            | RankingError::TournamentNotActive(_) => StatusCode::CONFLICT,
            RankingError::JoinRequired(_) => StatusCode::FORBIDDEN,
            RankingError::AttemptsExceeded => StatusCode::TOO_MANY_REQUESTS,
            RankingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match &self.0 {
            RankingError::NotFound(_) => "not_found",
            RankingError::InvalidArgument(_) => "invalid_argument",
            RankingError::OutOfRange { .. } => "out_of_range",
            RankingError::RanksDisabled(_) => "ranks_disabled",
            RankingError::TournamentFull(_) => "tournament_full",
            RankingError::TournamentNotActive(_) => "tournament_not_active",
            RankingError::JoinRequired(_) => "join_required",
            RankingError::AttemptsExceeded => "attempts_exceeded",
            RankingError::Storage(_) => "storage",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: self.code(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
