use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,

    /// Platform share of each settled payment, snapshotted onto every
    /// commission record at creation time.
    pub commission_rate: Decimal,

    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    /// Bound on every outbound processor call
    pub stripe_timeout_secs: u64,

    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub onboarding_refresh_url: String,
    pub onboarding_return_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let commission_rate = std::env::var("COMMISSION_RATE")
            .unwrap_or_else(|_| "0.10".to_string());
        let commission_rate = Decimal::from_str(&commission_rate).map_err(|e| {
            config::ConfigError::Message(format!("invalid COMMISSION_RATE: {}", e))
        })?;

        let stripe_timeout_secs = std::env::var("STRIPE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map_err(|e| {
                config::ConfigError::Message(format!("invalid STRIPE_TIMEOUT_SECS: {}", e))
            })?;

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/grannhjalp".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            commission_rate,
            stripe_secret_key: std::env::var("STRIPE_SECRET_KEY")
                .map_err(|_| config::ConfigError::Message("STRIPE_SECRET_KEY must be set".into()))?,
            stripe_webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
                .map_err(|_| config::ConfigError::Message("STRIPE_WEBHOOK_SECRET must be set".into()))?,
            stripe_timeout_secs,
            checkout_success_url: std::env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| "https://localhost/payments/success".to_string()),
            checkout_cancel_url: std::env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| "https://localhost/payments/cancel".to_string()),
            onboarding_refresh_url: std::env::var("ONBOARDING_REFRESH_URL")
                .unwrap_or_else(|_| "https://localhost/onboarding/refresh".to_string()),
            onboarding_return_url: std::env::var("ONBOARDING_RETURN_URL")
                .unwrap_or_else(|_| "https://localhost/onboarding/return".to_string()),
        })
    }
}
