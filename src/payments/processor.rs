// Payment processor boundary.
//
// The processor is never trusted with authorization decisions; it only sees
// opaque metadata that lets webhook events find their way back to our rows.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Metadata attached to a checkout session. These keys are what mark an
/// incoming webhook event as belonging to this integration.
#[derive(Debug, Clone)]
pub struct CheckoutMetadata {
    pub need_id: Uuid,
    pub help_offer_id: Uuid,
    pub requester_id: Uuid,
    pub helper_id: Uuid,
    pub original_amount: Decimal,
    pub commission_amount: Decimal,
}

impl CheckoutMetadata {
    fn to_form_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("metadata[need_id]".to_string(), self.need_id.to_string()),
            (
                "metadata[help_offer_id]".to_string(),
                self.help_offer_id.to_string(),
            ),
            (
                "metadata[requester_id]".to_string(),
                self.requester_id.to_string(),
            ),
            ("metadata[helper_id]".to_string(), self.helper_id.to_string()),
            (
                "metadata[original_amount]".to_string(),
                self.original_amount.to_string(),
            ),
            (
                "metadata[commission_amount]".to_string(),
                self.commission_amount.to_string(),
            ),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ConnectedAccount {
    pub id: String,
}

/// Outbound processor operations. All calls carry a bounded timeout and fail
/// as `Upstream` without touching local state.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_checkout_session(
        &self,
        amount: Decimal,
        currency: &str,
        product_name: &str,
        success_url: &str,
        cancel_url: &str,
        metadata: CheckoutMetadata,
    ) -> AppResult<CheckoutSession>;

    /// Move the helper's portion to their connected account. The idempotency
    /// key makes a replayed call return the original transfer instead of
    /// moving funds twice.
    async fn create_transfer(
        &self,
        amount: Decimal,
        currency: &str,
        destination_account: &str,
        idempotency_key: Uuid,
    ) -> AppResult<Transfer>;

    async fn create_connected_account(&self, email: &str, user_id: Uuid)
        -> AppResult<ConnectedAccount>;

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> AppResult<String>;
}

/// Convert a major-unit amount to the processor's integer minor units
/// (öre for SEK-like currencies).
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::from(100))
        .round_dp(0)
        .to_i64()
        .ok_or_else(|| AppError::Invalid(format!("amount {} not representable in minor units", amount)))
}

// ============ STRIPE CLIENT ============

#[derive(Debug, Deserialize)]
struct StripeSessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeIdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeLinkResponse {
    url: String,
}

pub struct StripeClient {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl StripeClient {
    pub fn new(secret_key: String, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            secret_key,
            api_base: STRIPE_API_BASE.to_string(),
            client,
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<String>,
    ) -> AppResult<T> {
        let mut request = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(params);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "stripe returned {}: {}",
                status, error_text
            )));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_checkout_session(
        &self,
        amount: Decimal,
        currency: &str,
        product_name: &str,
        success_url: &str,
        cancel_url: &str,
        metadata: CheckoutMetadata,
    ) -> AppResult<CheckoutSession> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                currency.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                product_name.to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                to_minor_units(amount)?.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
        ];
        params.extend(metadata.to_form_pairs());

        let session: StripeSessionResponse = self
            .post_form("/checkout/sessions", &params, None)
            .await?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn create_transfer(
        &self,
        amount: Decimal,
        currency: &str,
        destination_account: &str,
        idempotency_key: Uuid,
    ) -> AppResult<Transfer> {
        let params = vec![
            ("amount".to_string(), to_minor_units(amount)?.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("destination".to_string(), destination_account.to_string()),
            (
                "metadata[commission_id]".to_string(),
                idempotency_key.to_string(),
            ),
        ];

        let transfer: StripeIdResponse = self
            .post_form("/transfers", &params, Some(idempotency_key.to_string()))
            .await?;

        Ok(Transfer { id: transfer.id })
    }

    async fn create_connected_account(
        &self,
        email: &str,
        user_id: Uuid,
    ) -> AppResult<ConnectedAccount> {
        let params = vec![
            ("type".to_string(), "express".to_string()),
            ("email".to_string(), email.to_string()),
            ("metadata[user_id]".to_string(), user_id.to_string()),
        ];

        let account: StripeIdResponse = self.post_form("/accounts", &params, None).await?;

        Ok(ConnectedAccount { id: account.id })
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> AppResult<String> {
        let params = vec![
            ("account".to_string(), account_id.to_string()),
            ("refresh_url".to_string(), refresh_url.to_string()),
            ("return_url".to_string(), return_url.to_string()),
            ("type".to_string(), "account_onboarding".to_string()),
        ];

        let link: StripeLinkResponse = self.post_form("/account_links", &params, None).await?;

        Ok(link.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(to_minor_units(dec!(200.00)).unwrap(), 20_000);
        assert_eq!(to_minor_units(dec!(180.50)).unwrap(), 18_050);
        assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
    }

    #[test]
    fn test_metadata_form_pairs_carry_marker_keys() {
        let metadata = CheckoutMetadata {
            need_id: Uuid::new_v4(),
            help_offer_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            helper_id: Uuid::new_v4(),
            original_amount: dec!(200),
            commission_amount: dec!(20),
        };

        let pairs = metadata.to_form_pairs();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"metadata[need_id]"));
        assert!(keys.contains(&"metadata[help_offer_id]"));
        assert!(keys.contains(&"metadata[helper_id]"));
    }
}
