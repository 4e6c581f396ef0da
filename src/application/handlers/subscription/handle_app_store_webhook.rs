//! HandleAppStoreWebhookHandler - Command handler for app store webhooks.

use std::sync::Arc;

use super::reconcile::SubscriptionReconciler;
use crate::domain::subscription::{DecodedEvent, WebhookError, WebhookOutcome, WebhookVerifier};
use crate::ports::WebhookDecoder;

/// Command to handle an app store webhook.
#[derive(Debug, Clone)]
pub struct HandleAppStoreWebhookCommand {
    pub payload: Vec<u8>,
    /// Signature header value, same `t=..,v1=..` scheme as the primary provider.
    pub signature: String,
}

/// Handler for app store webhook deliveries.
///
/// App store payloads are self-contained, so there is no enrichment step.
pub struct HandleAppStoreWebhookHandler {
    verifier: WebhookVerifier,
    decoder: Arc<dyn WebhookDecoder>,
    reconciler: Arc<SubscriptionReconciler>,
}

impl HandleAppStoreWebhookHandler {
    pub fn new(
        verifier: WebhookVerifier,
        decoder: Arc<dyn WebhookDecoder>,
        reconciler: Arc<SubscriptionReconciler>,
    ) -> Self {
        Self {
            verifier,
            decoder,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleAppStoreWebhookCommand,
    ) -> Result<WebhookOutcome, WebhookError> {
        self.verifier
            .verify(&cmd.payload, &cmd.signature)
            .map_err(|e| {
                tracing::warn!(error = %e, "App store webhook signature rejected");
                e
            })?;

        let event = match self.decoder.decode(&cmd.payload)? {
            DecodedEvent::Recognized(event) => event,
            DecodedEvent::Unrecognized { id, event_type } => {
                tracing::info!(event_id = %id, event_type = %event_type, "Unhandled app store event acknowledged");
                return Ok(WebhookOutcome::Acknowledged);
            }
        };

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Processing app store webhook"
        );

        self.reconciler.reconcile(&event).await
    }
}
