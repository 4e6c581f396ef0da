//! Stripe payment provider adapter.
//!
//! - `StripeWebhookDecoder`: event envelopes into canonical webhook events
//! - `StripePaymentAdapter`: `PaymentProvider` over the Stripe REST API
//! - `MockPaymentProvider`: configurable in-process provider for tests
//!
//! # Security
//!
//! - API keys are held as `secrecy::SecretString` and redacted from `Debug`
//! - Webhook signatures are checked by the domain `WebhookVerifier` before
//!   the decoder ever sees a body

mod decoder;
mod mock_payment_provider;
mod stripe_adapter;
mod webhook_types;

pub use decoder::StripeWebhookDecoder;
pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use webhook_types::{StripeCheckoutSession, StripeInvoice, StripeSubscription, StripeWebhookEvent};
