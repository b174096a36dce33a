use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tracing::info;

use crate::{
    api::AppState,
    config::Config,
    error::AppResult,
    ledger::repository::LedgerRepository,
    notifier::Notifier,
    payments::{
        orchestrator::{PaymentConfig, PaymentOrchestrator},
        processor::StripeClient,
    },
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let pool = initialize_database(&config.database_url).await?;

    let ledger = Arc::new(LedgerRepository::new(pool.clone()));

    let notifier = Arc::new(Notifier::new(ledger.clone()));
    info!("✅ Notifier initialized");

    let stripe = Arc::new(StripeClient::new(
        config.stripe_secret_key.clone(),
        Duration::from_secs(config.stripe_timeout_secs),
    )?);
    info!(
        "✅ Payment processor client initialized ({}s timeout)",
        config.stripe_timeout_secs
    );

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        ledger.clone(),
        stripe,
        notifier.clone(),
        PaymentConfig {
            commission_rate: config.commission_rate,
            checkout_success_url: config.checkout_success_url.clone(),
            checkout_cancel_url: config.checkout_cancel_url.clone(),
            onboarding_refresh_url: config.onboarding_refresh_url.clone(),
            onboarding_return_url: config.onboarding_return_url.clone(),
        },
    ));
    info!(
        "✅ Payment orchestrator initialized (commission rate {})",
        config.commission_rate
    );

    Ok(AppState {
        ledger,
        orchestrator,
        notifier,
        webhook_secret: config.stripe_webhook_secret.clone(),
    })
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(50)
        .min_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
