use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use tracing::info;

use super::auth::AuthenticatedUser;
use super::models::{CheckoutRequest, CheckoutResponse, OnboardingResponse};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::payments::webhook;

/// Start a checkout for a mutually approved offer
/// POST /payments/checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let checkout_url = state
        .orchestrator
        .initiate_payment(request.need_id, request.help_offer_id, caller)
        .await?;

    Ok(Json(CheckoutResponse { checkout_url }))
}

/// Create/resume connected-account onboarding for the caller
/// POST /payments/onboarding
pub async fn start_onboarding(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<OnboardingResponse>> {
    let onboarding_url = state.orchestrator.start_onboarding(caller).await?;

    info!("Onboarding link issued for {}", caller);

    Ok(Json(OnboardingResponse { onboarding_url }))
}

/// Inbound processor events
/// POST /webhooks/stripe
///
/// The body is taken raw: the signature covers the exact bytes on the wire,
/// so verification has to happen before any deserialization.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Forbidden("missing webhook signature".to_string()))?;

    webhook::verify_signature(
        &state.webhook_secret,
        signature,
        &body,
        Utc::now().timestamp(),
    )?;

    webhook::process_event(&state.orchestrator, &body).await?;

    Ok(StatusCode::OK)
}
