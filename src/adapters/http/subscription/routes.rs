//! Axum router configuration for subscription endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    create_checkout, create_portal, handle_app_store_webhook, handle_stripe_webhook, health,
    SubscriptionAppState,
};

/// Webhook routes. Unauthenticated; every body is signature-verified.
///
/// - `POST /stripe`
/// - `POST /app-store`
pub fn webhook_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/stripe", post(handle_stripe_webhook))
        .route("/app-store", post(handle_app_store_webhook))
}

/// Session factory routes.
///
/// - `POST /checkout`
/// - `POST /portal`
pub fn session_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/portal", post(create_portal))
}

/// Complete router, mounted at the service root.
pub fn subscription_router() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/webhooks", webhook_routes())
        .nest("/subscriptions", session_routes())
}
