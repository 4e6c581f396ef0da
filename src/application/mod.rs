//! Application layer - Commands and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, CreatePortalSessionCommand,
    CreatePortalSessionHandler, EntitlementFallback, FallbackResolution,
    HandleAppStoreWebhookCommand, HandleAppStoreWebhookHandler, HandleStripeWebhookCommand,
    HandleStripeWebhookHandler, PaymentFailurePolicy, SessionError, SubscriptionReconciler,
};
