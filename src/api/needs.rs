use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::auth::AuthenticatedUser;
use super::models::{CreateNeedRequest, NeedResponse};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::offers::state::OfferState;

/// Post a new need
/// POST /needs
pub async fn create_need(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<CreateNeedRequest>,
) -> AppResult<Json<NeedResponse>> {
    request.validate()?;

    if let Some(amount) = request.budget_amount {
        if amount <= Decimal::ZERO {
            return Err(AppError::Invalid("budget amount must be positive".to_string()));
        }
    }

    let currency = request
        .budget_currency
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| "sek".to_string());

    let need = state
        .ledger
        .create_need(
            caller,
            &request.title,
            &request.description,
            request.category,
            request.budget_amount,
            &currency,
            request.location,
            request.needed_by,
        )
        .await?;

    info!("Need created: {} by {}", need.id, caller);

    Ok(Json(NeedResponse::from_need(need, &[])))
}

/// Fetch a need with its projected status
/// GET /needs/:id
pub async fn get_need(
    State(state): State<AppState>,
    Path(need_id): Path<Uuid>,
) -> AppResult<Json<NeedResponse>> {
    let need = state
        .ledger
        .get_need(need_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("need {}", need_id)))?;

    let offer_states: Vec<OfferState> = state
        .ledger
        .list_offers_for_need(need_id)
        .await?
        .iter()
        .map(|offer| offer.state)
        .collect();

    Ok(Json(NeedResponse::from_need(need, &offer_states)))
}

/// Owner-only cancellation
/// POST /needs/:id/cancel
pub async fn cancel_need(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(need_id): Path<Uuid>,
) -> AppResult<Json<NeedResponse>> {
    let need = state.ledger.cancel_need(need_id, caller).await?;

    info!("Need cancelled: {}", need_id);

    Ok(Json(NeedResponse::from_need(need, &[])))
}

/// Owner-only deletion; offers cascade, the money trail survives
/// DELETE /needs/:id
pub async fn delete_need(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(need_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.ledger.delete_need(need_id, caller).await?;

    info!("Need deleted: {}", need_id);

    Ok(StatusCode::NO_CONTENT)
}
