// Inbound processor events.
//
// The payload is untrusted input: the signature over the raw body is checked
// before anything is parsed, unknown event kinds are acknowledged and
// ignored, and events that are missing our metadata are logged and skipped
// so that someone else's integration can never crash the workflow.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::payments::orchestrator::PaymentOrchestrator;

type HmacSha256 = Hmac<Sha256>;

/// Events older (or newer) than this are rejected to limit replay windows
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
const EVENT_ACCOUNT_UPDATED: &str = "account.updated";

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct AccountObject {
    id: String,
    #[serde(default)]
    details_submitted: bool,
    #[serde(default)]
    payouts_enabled: bool,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Verify the processor's signature header against the raw request body.
///
/// The header carries a unix timestamp and one or more HMAC-SHA256
/// signatures over `"{timestamp}.{body}"`; any valid signature within the
/// tolerance window passes. Comparison is constant-time via the Mac verify.
pub fn verify_signature(
    secret: &str,
    signature_header: &str,
    payload: &[u8],
    now_unix: i64,
) -> AppResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::Forbidden("malformed webhook signature header".to_string()))?;

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::Forbidden(
            "webhook timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Config("invalid webhook secret".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    for candidate in candidates {
        if let Ok(expected) = hex::decode(candidate) {
            if mac.clone().verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }
    }

    Err(AppError::Forbidden(
        "webhook signature verification failed".to_string(),
    ))
}

/// Parse a verified event payload and route it to the orchestrator
pub async fn process_event(
    orchestrator: &PaymentOrchestrator,
    payload: &[u8],
) -> AppResult<()> {
    let event: StripeEvent = serde_json::from_slice(payload)
        .map_err(|e| AppError::Invalid(format!("malformed event payload: {}", e)))?;

    match event.kind.as_str() {
        EVENT_CHECKOUT_COMPLETED => {
            let session: CheckoutSessionObject =
                match serde_json::from_value(event.data.object) {
                    Ok(session) => session,
                    Err(e) => {
                        warn!("event {}: unreadable checkout session, skipping: {}", event.id, e);
                        return Ok(());
                    }
                };

            // Only sessions we created carry these keys; anything else
            // belongs to another integration.
            if !session.metadata.contains_key("need_id")
                || !session.metadata.contains_key("help_offer_id")
            {
                warn!(
                    "event {}: checkout session {} has no marketplace metadata, skipping",
                    event.id, session.id
                );
                return Ok(());
            }

            orchestrator
                .reconcile_payment_completed(&session.id, session.payment_intent.as_deref())
                .await
        }
        EVENT_ACCOUNT_UPDATED => {
            let account: AccountObject = match serde_json::from_value(event.data.object) {
                Ok(account) => account,
                Err(e) => {
                    warn!("event {}: unreadable account object, skipping: {}", event.id, e);
                    return Ok(());
                }
            };

            let user_id = account
                .metadata
                .get("user_id")
                .and_then(|v| Uuid::parse_str(v).ok());

            orchestrator
                .reconcile_account_updated(
                    &account.id,
                    account.details_submitted,
                    account.payouts_enabled,
                    user_id,
                )
                .await
        }
        other => {
            debug!("ignoring webhook event {} of kind {}", event.id, other);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::repository::LedgerRepository;
    use crate::notifier::Notifier;
    use crate::payments::orchestrator::PaymentConfig;
    use crate::payments::processor::{
        CheckoutMetadata, CheckoutSession, ConnectedAccount, PaymentProcessor, Transfer,
    };
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    const SECRET: &str = "whsec_test_secret";

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature_passes() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(SECRET, 1_700_000_000, body);
        assert!(verify_signature(SECRET, &header, body, 1_700_000_010).is_ok());
    }

    #[test]
    fn test_tampered_body_fails() {
        let header = sign(SECRET, 1_700_000_000, br#"{"id":"evt_1"}"#);
        let result = verify_signature(SECRET, &header, br#"{"id":"evt_2"}"#, 1_700_000_010);
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign("whsec_other", 1_700_000_000, body);
        assert!(verify_signature(SECRET, &header, body, 1_700_000_010).is_err());
    }

    #[test]
    fn test_stale_timestamp_fails() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(SECRET, 1_700_000_000, body);
        let result = verify_signature(SECRET, &header, body, 1_700_000_000 + 3600);
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_garbage_header_fails() {
        let body = br#"{"id":"evt_1"}"#;
        assert!(verify_signature(SECRET, "not-a-signature", body, 0).is_err());
        assert!(verify_signature(SECRET, "t=abc,v1=zz", body, 0).is_err());
    }

    // Processor double that must never be reached in the skip paths
    struct UnreachableProcessor;

    #[async_trait]
    impl PaymentProcessor for UnreachableProcessor {
        async fn create_checkout_session(
            &self,
            _: Decimal,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
            _: CheckoutMetadata,
        ) -> AppResult<CheckoutSession> {
            panic!("processor should not be called");
        }

        async fn create_transfer(
            &self,
            _: Decimal,
            _: &str,
            _: &str,
            _: Uuid,
        ) -> AppResult<Transfer> {
            panic!("processor should not be called");
        }

        async fn create_connected_account(&self, _: &str, _: Uuid) -> AppResult<ConnectedAccount> {
            panic!("processor should not be called");
        }

        async fn create_onboarding_link(&self, _: &str, _: &str, _: &str) -> AppResult<String> {
            panic!("processor should not be called");
        }
    }

    fn test_orchestrator() -> PaymentOrchestrator {
        // Lazy pool: never connects unless a query runs, which the skip
        // paths under test never do.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/unreachable")
            .unwrap();
        let ledger = Arc::new(LedgerRepository::new(pool));
        let notifier = Arc::new(Notifier::new(ledger.clone()));

        PaymentOrchestrator::new(
            ledger,
            Arc::new(UnreachableProcessor),
            notifier,
            PaymentConfig {
                commission_rate: dec!(0.10),
                checkout_success_url: "https://localhost/success".to_string(),
                checkout_cancel_url: "https://localhost/cancel".to_string(),
                onboarding_refresh_url: "https://localhost/refresh".to_string(),
                onboarding_return_url: "https://localhost/return".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_unknown_event_kind_is_ignored() {
        let orchestrator = test_orchestrator();
        let payload = br#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
        assert!(process_event(&orchestrator, payload).await.is_ok());
    }

    #[tokio::test]
    async fn test_checkout_without_marketplace_metadata_is_skipped() {
        let orchestrator = test_orchestrator();
        let payload = br#"{
            "id": "evt_2",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_foreign", "metadata": {"shop": "someone-else"}}}
        }"#;
        assert!(process_event(&orchestrator, payload).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_invalid() {
        let orchestrator = test_orchestrator();
        let result = process_event(&orchestrator, b"not json").await;
        assert!(matches!(result, Err(AppError::Invalid(_))));
    }
}
