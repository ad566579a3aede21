use crate::error::ApiError;
use crate::health::HealthResponse;
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use pulse_trade_core::{BalanceAccount, Currency, SignalPayload, UserId};
use pulse_trade_ledger::{BalanceOp, ConversionReceipt};
use pulse_trade_orchestrator::Acknowledgement;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub balance_type: String,
    pub amount: Decimal,
    pub op: BalanceOp,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub amount: Decimal,
    pub currency: Currency,
}

/// POST /api/signals
///
/// Accepts once the signal is queued; the decision happens asynchronously.
pub async fn submit_signal(
    State(state): State<AppState>,
    payload: Result<Json<SignalPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Acknowledgement>), ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let signal = payload.validate().map_err(|e| {
        tracing::warn!("Rejected signal: {}", e);
        ApiError::Validation(e.to_string())
    })?;

    tracing::info!(
        "[{}] signal received for {} from {}",
        signal.correlation_id,
        signal.symbol,
        signal.source
    );
    let ack = state.pipeline.submit(signal)?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

/// GET /api/users/:user_id/balances
pub async fn get_balances(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<BalanceAccount>, ApiError> {
    Ok(Json(state.balances.get_balance(user_id).await?))
}

/// POST /api/users/:user_id/balances/adjust
pub async fn adjust_balance(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    request: Result<Json<AdjustRequest>, JsonRejection>,
) -> Result<Json<BalanceAccount>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::Validation(e.body_text()))?;
    let account = state
        .balances
        .update_balance(user_id, &request.balance_type, request.amount, request.op)
        .await?;
    tracing::info!(
        "Balance {} {} {} for user {}",
        request.op,
        request.amount,
        request.balance_type,
        user_id
    );
    Ok(Json(account))
}

/// POST /api/users/:user_id/balances/convert
pub async fn convert_commission(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    request: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConversionReceipt>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::Validation(e.body_text()))?;
    let receipt = state
        .balances
        .convert_commission(user_id, request.amount, request.currency)
        .await?;
    Ok(Json(receipt))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::collect(&state.aggregator, &state.health))
}
