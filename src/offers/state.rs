use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::ledger::models::NeedStatus;

/// Approval state of a help offer.
///
/// Withdrawal deletes the offer row, so there is no stored `Withdrawn`
/// variant: an offer that exists is in exactly one of these four states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "offer_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OfferState {
    Submitted,
    RequesterApproved,
    HelperApproved,
    MutuallyApproved,
}

/// Which side of the offer is acting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalParty {
    Requester,
    Helper,
}

impl OfferState {
    /// State of a freshly submitted offer. Helpers normally self-declare
    /// approval at submission, so the usual entry point is `HelperApproved`.
    pub fn initial(helper_approved: bool) -> Self {
        if helper_approved {
            OfferState::HelperApproved
        } else {
            OfferState::Submitted
        }
    }

    /// Apply an approval from one party. Re-approving an already approved
    /// side is a no-op, never an error, which makes the transition safe to
    /// replay in any order.
    pub fn approve(self, party: ApprovalParty) -> Self {
        match (self, party) {
            (OfferState::Submitted, ApprovalParty::Requester) => OfferState::RequesterApproved,
            (OfferState::Submitted, ApprovalParty::Helper) => OfferState::HelperApproved,
            (OfferState::RequesterApproved, ApprovalParty::Helper) => OfferState::MutuallyApproved,
            (OfferState::HelperApproved, ApprovalParty::Requester) => OfferState::MutuallyApproved,
            (state, _) => state,
        }
    }

    pub fn requester_approved(self) -> bool {
        matches!(
            self,
            OfferState::RequesterApproved | OfferState::MutuallyApproved
        )
    }

    pub fn helper_approved(self) -> bool {
        matches!(
            self,
            OfferState::HelperApproved | OfferState::MutuallyApproved
        )
    }

    /// Both sides have approved: contact details may be disclosed and the
    /// offer becomes eligible for payment.
    pub fn is_mutually_approved(self) -> bool {
        self == OfferState::MutuallyApproved
    }

    /// Helpers may back out any time before mutual approval
    pub fn can_withdraw(self) -> bool {
        !self.is_mutually_approved()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferState::Submitted => "submitted",
            OfferState::RequesterApproved => "requester_approved",
            OfferState::HelperApproved => "helper_approved",
            OfferState::MutuallyApproved => "mutually_approved",
        }
    }
}

/// Need status as presented to callers. The two `pending_*_contact` values
/// are projections over the need's offers; they are never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectedNeedStatus {
    Open,
    PendingHelperContact,
    PendingRequesterContact,
    InProgress,
    Completed,
    Cancelled,
}

/// Compute the caller-facing status of a need from its stored status and the
/// states of its offers. Approving an offer never writes `needs.status`;
/// the transitional statuses exist only through this projection.
pub fn project_need_status(status: NeedStatus, offers: &[OfferState]) -> ProjectedNeedStatus {
    match status {
        NeedStatus::Completed => ProjectedNeedStatus::Completed,
        NeedStatus::Cancelled => ProjectedNeedStatus::Cancelled,
        NeedStatus::InProgress => ProjectedNeedStatus::InProgress,
        NeedStatus::Open => {
            if offers.iter().any(|s| s.is_mutually_approved()) {
                ProjectedNeedStatus::InProgress
            } else if offers.iter().any(|s| *s == OfferState::RequesterApproved) {
                ProjectedNeedStatus::PendingHelperContact
            } else if offers.iter().any(|s| *s == OfferState::HelperApproved) {
                ProjectedNeedStatus::PendingRequesterContact
            } else {
                ProjectedNeedStatus::Open
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_is_symmetric() {
        // requester-then-helper and helper-then-requester end the same
        let a = OfferState::Submitted
            .approve(ApprovalParty::Requester)
            .approve(ApprovalParty::Helper);
        let b = OfferState::Submitted
            .approve(ApprovalParty::Helper)
            .approve(ApprovalParty::Requester);

        assert_eq!(a, OfferState::MutuallyApproved);
        assert_eq!(a, b);
    }

    #[test]
    fn test_reapproval_is_noop() {
        let state = OfferState::HelperApproved.approve(ApprovalParty::Helper);
        assert_eq!(state, OfferState::HelperApproved);

        let state = OfferState::MutuallyApproved.approve(ApprovalParty::Requester);
        assert_eq!(state, OfferState::MutuallyApproved);
    }

    #[test]
    fn test_typical_lifecycle() {
        // helper self-declares at submission, requester approves later
        let state = OfferState::initial(true);
        assert_eq!(state, OfferState::HelperApproved);
        assert!(!state.is_mutually_approved());
        assert!(state.can_withdraw());

        let state = state.approve(ApprovalParty::Requester);
        assert!(state.is_mutually_approved());
        assert!(!state.can_withdraw());
    }

    #[test]
    fn test_flag_accessors() {
        assert!(OfferState::RequesterApproved.requester_approved());
        assert!(!OfferState::RequesterApproved.helper_approved());
        assert!(OfferState::MutuallyApproved.requester_approved());
        assert!(OfferState::MutuallyApproved.helper_approved());
    }

    #[test]
    fn test_projection_from_offer_states() {
        let open = NeedStatus::Open;

        assert_eq!(project_need_status(open, &[]), ProjectedNeedStatus::Open);
        assert_eq!(
            project_need_status(open, &[OfferState::HelperApproved]),
            ProjectedNeedStatus::PendingRequesterContact
        );
        assert_eq!(
            project_need_status(open, &[OfferState::RequesterApproved]),
            ProjectedNeedStatus::PendingHelperContact
        );
        assert_eq!(
            project_need_status(
                open,
                &[OfferState::HelperApproved, OfferState::MutuallyApproved]
            ),
            ProjectedNeedStatus::InProgress
        );
    }

    #[test]
    fn test_projection_respects_stored_terminal_status() {
        // terminal stored statuses win over whatever the offers look like
        assert_eq!(
            project_need_status(NeedStatus::Completed, &[OfferState::HelperApproved]),
            ProjectedNeedStatus::Completed
        );
        assert_eq!(
            project_need_status(NeedStatus::Cancelled, &[OfferState::MutuallyApproved]),
            ProjectedNeedStatus::Cancelled
        );
    }
}
