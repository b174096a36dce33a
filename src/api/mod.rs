pub mod auth;
pub mod models;
pub mod needs;
pub mod notifications;
pub mod offers;
pub mod payments;
pub mod users;

use axum::Json;
use chrono::Utc;
use std::sync::Arc;

use crate::ledger::repository::LedgerRepository;
use crate::notifier::Notifier;
use crate::payments::orchestrator::PaymentOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerRepository>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub notifier: Arc<Notifier>,
    /// Secret for verifying inbound processor event signatures
    pub webhook_secret: String,
}

/// GET /health
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now(),
    }))
}
