//! HTTP adapter for subscription endpoints.
//!
//! - `POST /webhooks/stripe` - Stripe deliveries (`Stripe-Signature`)
//! - `POST /webhooks/app-store` - App store deliveries (`AppStore-Signature`)
//! - `POST /subscriptions/checkout` - Start a checkout
//! - `POST /subscriptions/portal` - Open the billing portal
//! - `GET /health`

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{SubscriptionAppState, APP_STORE_SIGNATURE_HEADER, STRIPE_SIGNATURE_HEADER};
pub use routes::subscription_router;
