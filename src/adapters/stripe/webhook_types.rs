//! Stripe-specific types for webhook handling.
//!
//! These types represent Stripe API objects as they arrive in webhook payloads
//! and API responses. Only the fields the reconciler needs are declared; serde
//! ignores the rest.

use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::foundation::Timestamp;

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event as received from the API.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    /// Event payload containing the affected object.
    pub data: StripeEventData,

    /// Whether this is a live or test event.
    #[serde(default)]
    pub livemode: bool,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    /// The object affected by this event. Decoded per event type.
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Object Types
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    /// Customer ID if customer was created/attached.
    pub customer: Option<String>,

    /// Subscription ID if checkout created a subscription.
    pub subscription: Option<String>,

    /// Payment mode (payment, setup, subscription).
    pub mode: String,

    /// Checkout correlation written when the session was created.
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Present only when the line items were expanded.
    pub line_items: Option<StripeList<StripeLineItem>>,

    /// Hosted checkout page; only on API responses.
    pub url: Option<String>,
}

/// Generic Stripe list container.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

/// Checkout session line item.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeLineItem {
    pub price: Option<StripePrice>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    /// Customer ID owning this subscription.
    pub customer: Option<String>,

    /// Subscription status.
    pub status: String,

    /// Current period end (Unix timestamp).
    pub current_period_end: Option<i64>,

    /// Whether subscription cancels at period end.
    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// Scheduled cancellation (Unix timestamp).
    pub cancel_at: Option<i64>,

    /// Subscription items (price/quantity pairs).
    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
}

impl StripeSubscription {
    /// Price of the first subscription item.
    pub fn price_id(&self) -> Option<String> {
        self.items.data.first().map(|item| item.price.id.clone())
    }

    pub fn current_period_end(&self) -> Option<Timestamp> {
        self.current_period_end.and_then(Timestamp::from_unix_secs)
    }

    /// Effective cancellation time.
    ///
    /// `cancel_at_period_end` without an explicit `cancel_at` cancels at the
    /// end of the current period.
    pub fn effective_cancel_at(&self) -> Option<Timestamp> {
        match self.cancel_at {
            Some(at) => Timestamp::from_unix_secs(at),
            None if self.cancel_at_period_end => self.current_period_end(),
            None => None,
        }
    }
}

/// Single subscription item.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    /// Price object.
    pub price: StripePrice,

    /// Item quantity.
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Stripe Price object (embedded in subscription and line items).
#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    /// Price ID.
    pub id: String,
}

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    /// Customer ID.
    pub customer: Option<String>,

    /// Associated subscription ID. Absent on one-time invoices.
    pub subscription: Option<String>,

    /// Invoice line items.
    #[serde(default)]
    pub lines: StripeList<StripeInvoiceLineItem>,
}

impl StripeInvoice {
    /// Price of the first line carrying one.
    pub fn price_id(&self) -> Option<String> {
        self.lines
            .data
            .iter()
            .find_map(|line| line.price.as_ref().map(|p| p.id.clone()))
    }

    /// End of the billing period this invoice covers.
    pub fn period_end(&self) -> Option<Timestamp> {
        self.lines
            .data
            .iter()
            .filter_map(|line| line.period.as_ref())
            .map(|period| period.end)
            .max()
            .and_then(Timestamp::from_unix_secs)
    }
}

/// Single invoice line item.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceLineItem {
    pub price: Option<StripePrice>,

    /// Billing period for this line.
    pub period: Option<StripeInvoicePeriod>,
}

/// Invoice line item period.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoicePeriod {
    /// Period start (Unix timestamp).
    pub start: i64,

    /// Period end (Unix timestamp).
    pub end: i64,
}

/// Billing portal session (API response only).
#[derive(Debug, Clone, Deserialize)]
pub struct StripePortalSession {
    pub id: String,
    pub url: String,
}

/// Error body returned by the Stripe API.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}
