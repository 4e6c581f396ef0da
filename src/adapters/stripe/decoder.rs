//! Stripe event decoder.
//!
//! Turns an authenticated Stripe event envelope into the canonical
//! `WebhookEvent` vocabulary. Event types the reconciler has no rule for
//! come back as `DecodedEvent::Unrecognized`.

use serde::de::DeserializeOwned;

use super::webhook_types::{StripeCheckoutSession, StripeInvoice, StripeSubscription, StripeWebhookEvent};
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{
    CheckoutCompleted, CheckoutCorrelation, CheckoutMode, DecodedEvent, InvoiceEvent,
    ProviderEvent, ProviderStatus, PurchasedPrice, SubscriptionChanged, TrialWillEnd,
    WebhookError, WebhookEvent,
};
use crate::ports::WebhookDecoder;

#[derive(Debug, Clone, Default)]
pub struct StripeWebhookDecoder {
    require_livemode: bool,
}

impl StripeWebhookDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat test-mode events as unrecognized.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }

    fn decode_event(&self, envelope: &StripeWebhookEvent) -> Result<Option<WebhookEvent>, WebhookError> {
        let event = match envelope.event_type.as_str() {
            "checkout.session.completed" => {
                WebhookEvent::CheckoutCompleted(checkout_completed(object(envelope)?)?)
            }
            "invoice.paid" | "invoice.payment_succeeded" => {
                WebhookEvent::InvoicePaid(invoice(object(envelope)?))
            }
            "invoice.payment_failed" => WebhookEvent::InvoiceFailed(invoice(object(envelope)?)),
            "customer.subscription.updated" => {
                WebhookEvent::SubscriptionUpdated(subscription_changed(object(envelope)?))
            }
            "customer.subscription.deleted" => {
                WebhookEvent::SubscriptionDeleted(subscription_changed(object(envelope)?))
            }
            "customer.subscription.trial_will_end" => {
                let sub: StripeSubscription = object(envelope)?;
                WebhookEvent::TrialWillEnd(TrialWillEnd {
                    subscription_id: sub.id,
                    trial_end: envelope
                        .data
                        .object
                        .get("trial_end")
                        .and_then(|v| v.as_i64())
                        .and_then(Timestamp::from_unix_secs),
                })
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

impl WebhookDecoder for StripeWebhookDecoder {
    fn provider(&self) -> &'static str {
        "stripe"
    }

    fn decode(&self, payload: &[u8]) -> Result<DecodedEvent, WebhookError> {
        let envelope: StripeWebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        if self.require_livemode && !envelope.livemode {
            tracing::info!(event_id = %envelope.id, "Test mode event in livemode deployment");
            return Ok(DecodedEvent::Unrecognized {
                id: envelope.id,
                event_type: envelope.event_type,
            });
        }

        let occurred_at = Timestamp::from_unix_secs(envelope.created).ok_or_else(|| {
            WebhookError::InvalidField {
                field: "created",
                reason: format!("{} is not a valid unix time", envelope.created),
            }
        })?;

        match self.decode_event(&envelope)? {
            Some(event) => Ok(DecodedEvent::Recognized(ProviderEvent {
                id: envelope.id,
                event_type: envelope.event_type,
                occurred_at,
                event,
            })),
            None => Ok(DecodedEvent::Unrecognized {
                id: envelope.id,
                event_type: envelope.event_type,
            }),
        }
    }
}

/// Decodes `data.object` as the type the event kind implies.
///
/// Required fields on the object are enforced by the serde types; a missing
/// one is a decode failure on an authentic event.
fn object<T: DeserializeOwned>(envelope: &StripeWebhookEvent) -> Result<T, WebhookError> {
    serde_json::from_value(envelope.data.object.clone()).map_err(|e| WebhookError::InvalidField {
        field: "data.object",
        reason: e.to_string(),
    })
}

fn checkout_completed(session: StripeCheckoutSession) -> Result<CheckoutCompleted, WebhookError> {
    let mode = match session.mode.as_str() {
        "subscription" => CheckoutMode::Subscription,
        "payment" => CheckoutMode::Payment,
        other => {
            return Err(WebhookError::InvalidField {
                field: "mode",
                reason: format!("unsupported checkout mode '{}'", other),
            })
        }
    };

    let correlation = CheckoutCorrelation::from_metadata(&session.metadata)?;

    // Expanded line items settle one-time purchases; subscription
    // checkouts still need the period end from the subscription.
    let purchased = match mode {
        CheckoutMode::Payment => session
            .line_items
            .as_ref()
            .and_then(|items| items.data.iter().find_map(|item| item.price.as_ref()))
            .map(|price| PurchasedPrice {
                price_id: price.id.clone(),
                current_period_end: None,
                cancel_at: None,
            }),
        CheckoutMode::Subscription => None,
    };

    Ok(CheckoutCompleted {
        session_id: session.id,
        mode,
        subscription_id: session.subscription,
        customer_id: session.customer,
        correlation,
        purchased,
    })
}

fn invoice(invoice: StripeInvoice) -> InvoiceEvent {
    InvoiceEvent {
        price_id: invoice.price_id(),
        period_end: invoice.period_end(),
        invoice_id: invoice.id,
        subscription_id: invoice.subscription,
        customer_id: invoice.customer,
    }
}

fn subscription_changed(sub: StripeSubscription) -> SubscriptionChanged {
    SubscriptionChanged {
        price_id: sub.price_id(),
        current_period_end: sub.current_period_end(),
        cancel_at: sub.effective_cancel_at(),
        status: ProviderStatus::parse(&sub.status),
        subscription_id: sub.id,
        customer_id: sub.customer,
    }
}
