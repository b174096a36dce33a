use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::api::{
    health_check,
    needs::{cancel_need, create_need, delete_need, get_need},
    notifications::{list_notifications, mark_notification_read},
    offers::{approve_offer, create_offer, list_offers, withdraw_offer},
    payments::{create_checkout, start_onboarding, stripe_webhook},
    users::{create_user, get_me},
    AppState,
};

/// Bound on inbound request bodies, webhook payloads included
const MAX_BODY_BYTES: usize = 128 * 1024;

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                // User profiles
                .route("/users", post(create_user))
                .route("/users/me", get(get_me))
                // Needs
                .route("/needs", post(create_need))
                .route("/needs/:id", get(get_need).delete(delete_need))
                .route("/needs/:id/cancel", post(cancel_need))
                // Help offers
                .route("/needs/:id/offers", post(create_offer).get(list_offers))
                .route("/offers/:id/approve", post(approve_offer))
                .route("/offers/:id/withdraw", post(withdraw_offer))
                // Payments
                .route("/payments/checkout", post(create_checkout))
                .route("/payments/onboarding", post(start_onboarding))
                .route("/webhooks/stripe", post(stripe_webhook))
                // Notifications
                .route("/notifications", get(list_notifications))
                .route("/notifications/:id/read", post(mark_notification_read)),
        )
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
