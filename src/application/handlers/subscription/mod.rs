//! Subscription command handlers.

mod create_checkout_session;
mod create_portal_session;
mod entitlement_fallback;
mod handle_app_store_webhook;
mod handle_stripe_webhook;
mod reconcile;
mod session_error;

pub use create_checkout_session::{CreateCheckoutSessionCommand, CreateCheckoutSessionHandler};
pub use create_portal_session::{CreatePortalSessionCommand, CreatePortalSessionHandler};
pub use entitlement_fallback::{EntitlementFallback, FallbackResolution};
pub use handle_app_store_webhook::{HandleAppStoreWebhookCommand, HandleAppStoreWebhookHandler};
pub use handle_stripe_webhook::{HandleStripeWebhookCommand, HandleStripeWebhookHandler};
pub use reconcile::{PaymentFailurePolicy, SubscriptionReconciler};
pub use session_error::SessionError;
