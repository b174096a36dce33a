// User-facing notifications, persisted through the ledger.
//
// This is a side-effect sink: callers never branch on the outcome, and a
// failure to record a notification must never roll back the state
// transition that produced it.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ledger::repository::LedgerRepository;

pub struct Notifier {
    ledger: Arc<LedgerRepository>,
}

impl Notifier {
    pub fn new(ledger: Arc<LedgerRepository>) -> Self {
        Self { ledger }
    }

    /// Fire-and-forget delivery. Errors are logged and swallowed.
    pub async fn notify(
        &self,
        recipient_id: Uuid,
        title: &str,
        message: &str,
        need_id: Option<Uuid>,
        help_offer_id: Option<Uuid>,
    ) {
        match self
            .ledger
            .insert_notification(recipient_id, title, message, need_id, help_offer_id)
            .await
        {
            Ok(notification) => {
                info!("📬 Notification queued: {} -> {}", notification.id, recipient_id);
            }
            Err(e) => {
                warn!("failed to record notification for {}: {:?}", recipient_id, e);
            }
        }
    }
}
