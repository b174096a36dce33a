pub mod state;

pub use state::{project_need_status, ApprovalParty, OfferState, ProjectedNeedStatus};
