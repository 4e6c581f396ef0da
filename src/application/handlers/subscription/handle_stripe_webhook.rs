//! HandleStripeWebhookHandler - Command handler for primary-provider webhooks.

use std::sync::Arc;

use super::reconcile::SubscriptionReconciler;
use crate::domain::subscription::{
    CheckoutCompleted, CheckoutMode, DecodedEvent, PurchasedPrice, WebhookError, WebhookEvent,
    WebhookOutcome, WebhookVerifier,
};
use crate::ports::{PaymentProvider, WebhookDecoder};

/// Command to handle a Stripe webhook.
#[derive(Debug, Clone)]
pub struct HandleStripeWebhookCommand {
    /// Raw webhook payload, exactly as received.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header value.
    pub signature: String,
}

/// Handler for Stripe webhook deliveries.
///
/// Authenticates the body, decodes it into a canonical event, fetches the
/// purchased price when the checkout payload does not carry it, and hands
/// the event to the reconciler.
pub struct HandleStripeWebhookHandler {
    verifier: WebhookVerifier,
    decoder: Arc<dyn WebhookDecoder>,
    payment_provider: Arc<dyn PaymentProvider>,
    reconciler: Arc<SubscriptionReconciler>,
}

impl HandleStripeWebhookHandler {
    pub fn new(
        verifier: WebhookVerifier,
        decoder: Arc<dyn WebhookDecoder>,
        payment_provider: Arc<dyn PaymentProvider>,
        reconciler: Arc<SubscriptionReconciler>,
    ) -> Self {
        Self {
            verifier,
            decoder,
            payment_provider,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleStripeWebhookCommand,
    ) -> Result<WebhookOutcome, WebhookError> {
        // 1. Authenticate before anything reads the body
        self.verifier
            .verify(&cmd.payload, &cmd.signature)
            .map_err(|e| {
                tracing::warn!(error = %e, "Stripe webhook signature rejected");
                e
            })?;

        // 2. Decode into the canonical vocabulary
        let mut event = match self.decoder.decode(&cmd.payload)? {
            DecodedEvent::Recognized(event) => event,
            DecodedEvent::Unrecognized { id, event_type } => {
                tracing::info!(event_id = %id, event_type = %event_type, "Unhandled Stripe event acknowledged");
                return Ok(WebhookOutcome::Acknowledged);
            }
        };

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Processing Stripe webhook"
        );

        // 3. Thin checkout payloads carry no price; fetch it
        if let WebhookEvent::CheckoutCompleted(checkout) = &mut event.event {
            if checkout.purchased.is_none() {
                match self.purchased_price(checkout).await? {
                    Some(purchased) => checkout.purchased = Some(purchased),
                    None => {
                        tracing::info!(
                            event_id = %event.id,
                            session_id = %checkout.session_id,
                            "Checkout subscription unknown to provider"
                        );
                        return Ok(WebhookOutcome::LookupMiss);
                    }
                }
            }
        }

        // 4. Apply
        self.reconciler.reconcile(&event).await
    }

    /// Price and period of what a checkout bought.
    ///
    /// `None` means the provider no longer knows the subscription.
    async fn purchased_price(
        &self,
        checkout: &CheckoutCompleted,
    ) -> Result<Option<PurchasedPrice>, WebhookError> {
        match checkout.mode {
            CheckoutMode::Subscription => {
                let subscription_id = checkout
                    .subscription_id
                    .as_deref()
                    .ok_or(WebhookError::MissingField("subscription"))?;
                let Some(subscription) =
                    self.payment_provider.get_subscription(subscription_id).await?
                else {
                    return Ok(None);
                };
                let price_id = subscription
                    .price_id
                    .ok_or(WebhookError::MissingField("items.price"))?;
                Ok(Some(PurchasedPrice {
                    price_id,
                    current_period_end: subscription.current_period_end,
                    cancel_at: subscription.cancel_at,
                }))
            }
            CheckoutMode::Payment => {
                let item = self
                    .payment_provider
                    .list_checkout_line_items(&checkout.session_id)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or(WebhookError::MissingField("line_items"))?;
                Ok(Some(PurchasedPrice {
                    price_id: item.price_id,
                    current_period_end: None,
                    cancel_at: None,
                }))
            }
        }
    }
}
