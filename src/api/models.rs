use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::ledger::models::{HelpOffer, Need, NeedCategory, User};
use crate::offers::state::{project_need_status, OfferState, ProjectedNeedStatus};

// ========== REQUEST MODELS ==========

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNeedRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
    pub category: NeedCategory,

    pub budget_amount: Option<Decimal>,
    /// ISO 4217 code, lowercased; defaults to sek
    #[validate(length(equal = 3))]
    pub budget_currency: Option<String>,

    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub needed_by: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOfferRequest {
    #[validate(length(max = 2000))]
    pub message: Option<String>,
    /// Helpers normally self-declare approval at submission
    pub helper_approved: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub need_id: Uuid,
    pub help_offer_id: Uuid,
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub payouts_ready: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            email: user.email,
            phone: user.phone,
            payouts_ready: user.payouts_ready,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NeedResponse {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: NeedCategory,
    pub budget_amount: Option<Decimal>,
    pub budget_currency: String,
    pub location: Option<String>,
    pub needed_by: Option<NaiveDate>,
    /// Caller-facing status including the transitional projections
    pub status: ProjectedNeedStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NeedResponse {
    pub fn from_need(need: Need, offer_states: &[OfferState]) -> Self {
        let status = project_need_status(need.status, offer_states);
        Self {
            id: need.id,
            requester_id: need.requester_id,
            title: need.title,
            description: need.description,
            category: need.category,
            budget_amount: need.budget_amount,
            budget_currency: need.budget_currency,
            location: need.location,
            needed_by: need.needed_by,
            status,
            created_at: need.created_at,
            updated_at: need.updated_at,
        }
    }
}

/// Contact details, disclosed only between the parties of a mutually
/// approved offer
#[derive(Debug, Serialize)]
pub struct ContactDetails {
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<User> for ContactDetails {
    fn from(user: User) -> Self {
        Self {
            display_name: user.display_name,
            email: user.email,
            phone: user.phone,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OfferResponse {
    pub id: Uuid,
    pub need_id: Uuid,
    pub helper_id: Uuid,
    pub message: Option<String>,
    pub state: OfferState,
    pub requester_approved: bool,
    pub helper_approved: bool,
    pub mutually_approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helper_contact: Option<ContactDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_contact: Option<ContactDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OfferResponse {
    pub fn from_offer(
        offer: HelpOffer,
        helper_contact: Option<ContactDetails>,
        requester_contact: Option<ContactDetails>,
    ) -> Self {
        Self {
            id: offer.id,
            need_id: offer.need_id,
            helper_id: offer.helper_id,
            message: offer.message,
            state: offer.state,
            requester_approved: offer.state.requester_approved(),
            helper_approved: offer.state.helper_approved(),
            mutually_approved: offer.state.is_mutually_approved(),
            helper_contact,
            requester_contact,
            created_at: offer.created_at,
            updated_at: offer.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    pub onboarding_url: String,
}
