use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use uuid::Uuid;

pub use crate::offers::state::OfferState;

/// Closed category set for needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "need_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NeedCategory {
    Errands,
    Transport,
    Gardening,
    Cleaning,
    Repairs,
    Childcare,
    Tech,
    Other,
}

/// Stored need status. The transitional `pending_*_contact` statuses are
/// projections over offer state, see `offers::state::project_need_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "need_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NeedStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl NeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeedStatus::Open => "open",
            NeedStatus::InProgress => "in_progress",
            NeedStatus::Completed => "completed",
            NeedStatus::Cancelled => "cancelled",
        }
    }
}

/// Commission settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "commission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    /// Checkout session created, payment not yet captured
    Pending,
    /// Payment captured but the helper cannot receive a transfer yet
    TransferPending,
    /// Funds transferred, need settled
    Completed,
    /// Transfer call failed after capture; eligible for bounded retry
    TransferFailed,
}

/// User entity. The payment account lives on the profile: `stripe_account_id`
/// plus the `payouts_ready` flag, which is true only once the processor has
/// confirmed both details-submitted and payouts-enabled.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub stripe_account_id: Option<String>,
    pub payouts_ready: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A transfer may only target an account that exists and has finished
    /// onboarding.
    pub fn can_receive_transfers(&self) -> bool {
        self.stripe_account_id.is_some() && self.payouts_ready
    }
}

/// Need entity - a help request posted by a requester
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Need {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: NeedCategory,

    #[serde(with = "rust_decimal::serde::float_option")]
    pub budget_amount: Option<Decimal>,
    pub budget_currency: String,

    pub location: Option<String>,
    pub needed_by: Option<NaiveDate>,
    pub status: NeedStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Need {
    pub fn is_open(&self) -> bool {
        self.status == NeedStatus::Open
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.requester_id == user_id
    }
}

/// HelpOffer entity. At most one per (need, helper); the need's owner can
/// never be the helper on their own need.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HelpOffer {
    pub id: Uuid,
    pub need_id: Uuid,
    pub helper_id: Uuid,
    pub message: Option<String>,
    pub state: OfferState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HelpOffer {
    pub fn is_mutually_approved(&self) -> bool {
        self.state.is_mutually_approved()
    }
}

/// Commission entity - one row per payment attempt, keyed by the processor
/// checkout session. Need/offer references are nullable so the money trail
/// survives deletion of either parent.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Commission {
    pub id: Uuid,
    pub need_id: Option<Uuid>,
    pub help_offer_id: Option<Uuid>,
    pub helper_id: Uuid,
    pub requester_id: Uuid,

    #[serde(with = "rust_decimal::serde::float")]
    pub original_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub commission_amount: Decimal,
    /// Rate snapshotted at creation; never recomputed at settlement time
    #[serde(with = "rust_decimal::serde::float")]
    pub commission_rate: Decimal,
    pub currency: String,

    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub transfer_id: Option<String>,

    pub status: CommissionStatus,
    pub transfer_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Commission {
    /// Portion of the original amount owed to the helper
    pub fn helper_amount(&self) -> Decimal {
        self.original_amount - self.commission_amount
    }

    pub fn is_settled(&self) -> bool {
        self.status == CommissionStatus::Completed
    }
}

/// Notification entity - append-only except for the read flag
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub need_id: Option<Uuid>,
    pub help_offer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn user(account: Option<&str>, ready: bool) -> User {
        User {
            id: Uuid::new_v4(),
            display_name: "Test".to_string(),
            email: "test@example.com".to_string(),
            phone: None,
            stripe_account_id: account.map(str::to_string),
            payouts_ready: ready,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_transfer_readiness_requires_account_and_flag() {
        assert!(!user(None, false).can_receive_transfers());
        assert!(!user(None, true).can_receive_transfers());
        assert!(!user(Some("acct_123"), false).can_receive_transfers());
        assert!(user(Some("acct_123"), true).can_receive_transfers());
    }

    #[test]
    fn test_helper_amount_is_remainder() {
        let commission = Commission {
            id: Uuid::new_v4(),
            need_id: None,
            help_offer_id: None,
            helper_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            original_amount: dec!(200.00),
            commission_amount: dec!(20.00),
            commission_rate: dec!(0.10),
            currency: "sek".to_string(),
            checkout_session_id: "cs_test".to_string(),
            payment_intent_id: None,
            transfer_id: None,
            status: CommissionStatus::Pending,
            transfer_attempts: 0,
            created_at: Utc::now(),
            completed_at: None,
        };

        assert_eq!(commission.helper_amount(), dec!(180.00));
        assert!(!commission.is_settled());
    }
}
