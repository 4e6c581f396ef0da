//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `SubscriptionStore` - User and community record stores (read + filtered write)
//! - `EntitlementReader` - Independently granted plan overrides (read-only)
//! - `PaymentProvider` - Primary billing provider API (enrichment, sessions)
//! - `WebhookDecoder` - Provider JSON to canonical events

mod entitlement_reader;
mod payment_provider;
mod subscription_store;
mod webhook_decoder;

pub use entitlement_reader::{Entitlement, EntitlementReader};
pub use payment_provider::{
    CheckoutLineItem, CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentErrorCode,
    PaymentProvider, PortalSession, ProviderSubscription,
};
pub use subscription_store::{LocatedSubscription, SubscriptionStore};
pub use webhook_decoder::WebhookDecoder;
