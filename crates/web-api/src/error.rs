use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pulse_trade_ledger::BalanceError;
use pulse_trade_orchestrator::PipelineError;
use serde_json::json;
use thiserror::Error;

/// Error body returned as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("API error: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<BalanceError> for ApiError {
    fn from(err: BalanceError) -> Self {
        match err {
            BalanceError::AccountNotFound(_) => Self::NotFound(err.to_string()),
            BalanceError::Store(_) => Self::Unavailable(err.to_string()),
            BalanceError::InvalidBalanceType(_)
            | BalanceError::InsufficientBalance { .. }
            | BalanceError::InvalidConversion(_)
            | BalanceError::InvalidAmount(_) => Self::Validation(err.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Unavailable(err.to_string())
    }
}
