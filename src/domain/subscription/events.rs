//! Canonical webhook events.
//!
//! Both providers' vocabularies decode into [`WebhookEvent`] once, at the
//! adapter boundary. Each variant carries only what the reconciler needs.

use serde::Serialize;

use super::principal::CheckoutCorrelation;
use super::source::SubscriptionSource;
use crate::domain::foundation::{Timestamp, UserId};

// ════════════════════════════════════════════════════════════════════════════════
// Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Result of decoding one authenticated delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    /// A kind the reconciler acts on.
    Recognized(ProviderEvent),
    /// A kind this service does not handle. Acknowledged, never retried.
    Unrecognized { id: String, event_type: String },
}

/// Decoded event plus the delivery metadata every variant shares.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvent {
    /// Provider event id, used for logging only.
    pub id: String,
    /// Raw provider event type string.
    pub event_type: String,
    /// When the provider created the event. Becomes `updatedAt`.
    pub occurred_at: Timestamp,
    pub event: WebhookEvent,
}

// ════════════════════════════════════════════════════════════════════════════════
// Canonical Union
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted(CheckoutCompleted),
    InvoicePaid(InvoiceEvent),
    InvoiceFailed(InvoiceEvent),
    SubscriptionUpdated(SubscriptionChanged),
    SubscriptionDeleted(SubscriptionChanged),
    TrialWillEnd(TrialWillEnd),
    AppStoreInitialPurchase(AppStorePurchase),
    AppStoreRenewal(AppStorePurchase),
    AppStoreCancellation(AppStorePurchase),
    AppStoreUncancellation(AppStorePurchase),
    AppStoreNonRenewing(AppStorePurchase),
    AppStoreExpiration(AppStorePurchase),
    AppStoreBillingIssue(AppStorePurchase),
    AppStoreProductChange(AppStoreProductChange),
}

impl WebhookEvent {
    /// Stable name for logs and response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookEvent::CheckoutCompleted(_) => "checkout_completed",
            WebhookEvent::InvoicePaid(_) => "invoice_paid",
            WebhookEvent::InvoiceFailed(_) => "invoice_failed",
            WebhookEvent::SubscriptionUpdated(_) => "subscription_updated",
            WebhookEvent::SubscriptionDeleted(_) => "subscription_deleted",
            WebhookEvent::TrialWillEnd(_) => "trial_will_end",
            WebhookEvent::AppStoreInitialPurchase(_) => "app_store_initial_purchase",
            WebhookEvent::AppStoreRenewal(_) => "app_store_renewal",
            WebhookEvent::AppStoreCancellation(_) => "app_store_cancellation",
            WebhookEvent::AppStoreUncancellation(_) => "app_store_uncancellation",
            WebhookEvent::AppStoreNonRenewing(_) => "app_store_non_renewing",
            WebhookEvent::AppStoreExpiration(_) => "app_store_expiration",
            WebhookEvent::AppStoreBillingIssue(_) => "app_store_billing_issue",
            WebhookEvent::AppStoreProductChange(_) => "app_store_product_change",
        }
    }

    /// Provider the event came from.
    pub fn source(&self) -> SubscriptionSource {
        match self {
            WebhookEvent::CheckoutCompleted(_)
            | WebhookEvent::InvoicePaid(_)
            | WebhookEvent::InvoiceFailed(_)
            | WebhookEvent::SubscriptionUpdated(_)
            | WebhookEvent::SubscriptionDeleted(_)
            | WebhookEvent::TrialWillEnd(_) => SubscriptionSource::Stripe,
            _ => SubscriptionSource::AppStore,
        }
    }

    /// Provider subscription id the event refers to, if it carries one.
    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            WebhookEvent::CheckoutCompleted(e) => e.subscription_id.as_deref(),
            WebhookEvent::InvoicePaid(e) | WebhookEvent::InvoiceFailed(e) => {
                e.subscription_id.as_deref()
            }
            WebhookEvent::SubscriptionUpdated(e) | WebhookEvent::SubscriptionDeleted(e) => {
                Some(e.subscription_id.as_str())
            }
            WebhookEvent::TrialWillEnd(e) => Some(e.subscription_id.as_str()),
            WebhookEvent::AppStoreProductChange(e) => {
                e.purchase.original_transaction_id.as_deref()
            }
            WebhookEvent::AppStoreInitialPurchase(e)
            | WebhookEvent::AppStoreRenewal(e)
            | WebhookEvent::AppStoreCancellation(e)
            | WebhookEvent::AppStoreUncancellation(e)
            | WebhookEvent::AppStoreNonRenewing(e)
            | WebhookEvent::AppStoreExpiration(e)
            | WebhookEvent::AppStoreBillingIssue(e) => e.original_transaction_id.as_deref(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Primary Provider Payloads
// ════════════════════════════════════════════════════════════════════════════════

/// Whether a checkout created a recurring subscription or a one-time payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    Subscription,
    Payment,
}

/// Price actually purchased, with the billing window when recurring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasedPrice {
    pub price_id: String,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutCompleted {
    pub session_id: String,
    pub mode: CheckoutMode,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub correlation: CheckoutCorrelation,
    /// Absent on thin payloads until enriched through the provider API.
    pub purchased: Option<PurchasedPrice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceEvent {
    pub invoice_id: String,
    /// One-time invoices have no subscription.
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub price_id: Option<String>,
    pub period_end: Option<Timestamp>,
}

/// Provider-side subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Paused,
    Other,
}

impl ProviderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "active" => ProviderStatus::Active,
            "trialing" => ProviderStatus::Trialing,
            "past_due" => ProviderStatus::PastDue,
            "unpaid" => ProviderStatus::Unpaid,
            "canceled" => ProviderStatus::Canceled,
            "incomplete" => ProviderStatus::Incomplete,
            "incomplete_expired" => ProviderStatus::IncompleteExpired,
            "paused" => ProviderStatus::Paused,
            _ => ProviderStatus::Other,
        }
    }

    /// Returns true if the provider is still billing this subscription normally.
    pub fn is_live(&self) -> bool {
        matches!(self, ProviderStatus::Active | ProviderStatus::Trialing)
    }
}

/// Subscription object carried by update and delete events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChanged {
    pub subscription_id: String,
    pub customer_id: Option<String>,
    pub status: ProviderStatus,
    pub price_id: Option<String>,
    pub current_period_end: Option<Timestamp>,
    /// Scheduled cancellation. `cancel_at_period_end` is folded in here.
    pub cancel_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialWillEnd {
    pub subscription_id: String,
    pub trial_end: Option<Timestamp>,
}

// ════════════════════════════════════════════════════════════════════════════════
// App Store Payloads
// ════════════════════════════════════════════════════════════════════════════════

/// In-app purchase fact. App store events always target a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStorePurchase {
    pub app_user_id: UserId,
    pub product_id: String,
    pub original_transaction_id: Option<String>,
    pub purchased_at: Option<Timestamp>,
    pub expiration_at: Option<Timestamp>,
    pub environment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStoreProductChange {
    pub purchase: AppStorePurchase,
    pub new_product_id: String,
}
