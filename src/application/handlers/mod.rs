//! Application handlers.
//!
//! Command handlers that orchestrate domain operations.

pub mod subscription;

pub use subscription::{
    // Webhooks
    HandleAppStoreWebhookCommand, HandleAppStoreWebhookHandler,
    HandleStripeWebhookCommand, HandleStripeWebhookHandler,
    // Reconciliation
    EntitlementFallback, FallbackResolution, PaymentFailurePolicy, SubscriptionReconciler,
    // Sessions
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler,
    CreatePortalSessionCommand, CreatePortalSessionHandler, SessionError,
};
