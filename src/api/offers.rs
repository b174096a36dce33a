use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::auth::AuthenticatedUser;
use super::models::{ContactDetails, CreateOfferRequest, OfferResponse};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::ledger::models::{HelpOffer, Need};

/// Submit an offer to help on an open need
/// POST /needs/:id/offers
pub async fn create_offer(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(need_id): Path<Uuid>,
    Json(request): Json<CreateOfferRequest>,
) -> AppResult<Json<OfferResponse>> {
    request.validate()?;

    let (offer, need) = state
        .ledger
        .create_offer(
            need_id,
            caller,
            request.message,
            request.helper_approved.unwrap_or(true),
        )
        .await?;

    info!("Offer {} created on need {} by {}", offer.id, need_id, caller);

    state
        .notifier
        .notify(
            need.requester_id,
            "New help offer",
            &format!("Someone offered to help with \"{}\".", need.title),
            Some(need.id),
            Some(offer.id),
        )
        .await;

    Ok(Json(OfferResponse::from_offer(offer, None, None)))
}

/// List the offers on a need. Helper contact details appear only on
/// mutually approved offers, and only for the two parties involved.
/// GET /needs/:id/offers
pub async fn list_offers(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(need_id): Path<Uuid>,
) -> AppResult<Json<Vec<OfferResponse>>> {
    let need = state
        .ledger
        .get_need(need_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("need {}", need_id)))?;

    let offers = state.ledger.list_offers_for_need(need_id).await?;

    let mut responses = Vec::with_capacity(offers.len());
    for offer in offers {
        responses.push(disclose(&state, &need, offer, caller).await?);
    }

    Ok(Json(responses))
}

/// Approve an offer as either party
/// POST /offers/:id/approve
pub async fn approve_offer(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(offer_id): Path<Uuid>,
) -> AppResult<Json<OfferResponse>> {
    let (offer, need, became_mutual) = state.ledger.approve_offer(offer_id, caller).await?;

    info!(
        "Offer {} approved by {}: state={:?}",
        offer.id, caller, offer.state
    );

    if became_mutual {
        state
            .notifier
            .notify(
                offer.helper_id,
                "Offer mutually approved",
                &format!(
                    "Your offer on \"{}\" was approved. Contact details are now visible.",
                    need.title
                ),
                Some(need.id),
                Some(offer.id),
            )
            .await;
        state
            .notifier
            .notify(
                need.requester_id,
                "Offer mutually approved",
                &format!(
                    "Your need \"{}\" has a confirmed helper. Contact details are now visible.",
                    need.title
                ),
                Some(need.id),
                Some(offer.id),
            )
            .await;
    } else if caller == need.requester_id {
        state
            .notifier
            .notify(
                offer.helper_id,
                "Offer approved",
                &format!("The requester approved your offer on \"{}\".", need.title),
                Some(need.id),
                Some(offer.id),
            )
            .await;
    }

    let response = disclose(&state, &need, offer, caller).await?;
    Ok(Json(response))
}

/// Withdraw an offer as its helper, legal while not mutually approved
/// POST /offers/:id/withdraw
pub async fn withdraw_offer(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(offer_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.ledger.withdraw_offer(offer_id, caller).await?;

    info!("Offer {} withdrawn by {}", offer_id, caller);

    Ok(StatusCode::NO_CONTENT)
}

/// Build an offer response with contact details attached exactly when the
/// mutual-approval gate allows: the requester sees the helper, the helper
/// sees the requester, everyone else sees neither.
async fn disclose(
    state: &AppState,
    need: &Need,
    offer: HelpOffer,
    caller: Uuid,
) -> AppResult<OfferResponse> {
    if !offer.is_mutually_approved() {
        return Ok(OfferResponse::from_offer(offer, None, None));
    }

    let helper_contact = if caller == need.requester_id {
        state
            .ledger
            .get_user(offer.helper_id)
            .await?
            .map(ContactDetails::from)
    } else {
        None
    };

    let requester_contact = if caller == offer.helper_id {
        state
            .ledger
            .get_user(need.requester_id)
            .await?
            .map(ContactDetails::from)
    } else {
        None
    };

    Ok(OfferResponse::from_offer(offer, helper_contact, requester_contact))
}
