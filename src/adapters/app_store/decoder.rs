//! App store event decoder.

use super::webhook_types::{AppStoreEventBody, AppStoreWebhookEnvelope};
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{
    AppStoreProductChange, AppStorePurchase, DecodedEvent, ProviderEvent, WebhookError,
    WebhookEvent,
};
use crate::ports::WebhookDecoder;

/// App store event kinds the reconciler has rules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppStoreKind {
    InitialPurchase,
    Renewal,
    Cancellation,
    Uncancellation,
    NonRenewing,
    Expiration,
    BillingIssue,
    ProductChange,
}

impl AppStoreKind {
    fn parse(event_type: &str) -> Option<Self> {
        Some(match event_type {
            "INITIAL_PURCHASE" => AppStoreKind::InitialPurchase,
            "RENEWAL" => AppStoreKind::Renewal,
            "CANCELLATION" => AppStoreKind::Cancellation,
            "UNCANCELLATION" => AppStoreKind::Uncancellation,
            "NON_RENEWING_PURCHASE" => AppStoreKind::NonRenewing,
            "EXPIRATION" => AppStoreKind::Expiration,
            "BILLING_ISSUE" => AppStoreKind::BillingIssue,
            "PRODUCT_CHANGE" => AppStoreKind::ProductChange,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppStoreWebhookDecoder;

impl AppStoreWebhookDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl WebhookDecoder for AppStoreWebhookDecoder {
    fn provider(&self) -> &'static str {
        "app_store"
    }

    fn decode(&self, payload: &[u8]) -> Result<DecodedEvent, WebhookError> {
        let envelope: AppStoreWebhookEnvelope = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        let body = envelope.event;

        let Some(kind) = AppStoreKind::parse(&body.event_type) else {
            return Ok(DecodedEvent::Unrecognized {
                id: body.id,
                event_type: body.event_type,
            });
        };

        let occurred_at = millis(body.event_timestamp_ms, "event.event_timestamp_ms")?
            .ok_or(WebhookError::MissingField("event.event_timestamp_ms"))?;

        let event = match kind {
            AppStoreKind::ProductChange => {
                let new_product_id = body
                    .new_product_id
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(WebhookError::MissingField("event.new_product_id"))?;
                WebhookEvent::AppStoreProductChange(AppStoreProductChange {
                    purchase: purchase(&body)?,
                    new_product_id,
                })
            }
            AppStoreKind::InitialPurchase => WebhookEvent::AppStoreInitialPurchase(purchase(&body)?),
            AppStoreKind::Renewal => WebhookEvent::AppStoreRenewal(purchase(&body)?),
            AppStoreKind::Cancellation => WebhookEvent::AppStoreCancellation(purchase(&body)?),
            AppStoreKind::Uncancellation => WebhookEvent::AppStoreUncancellation(purchase(&body)?),
            AppStoreKind::NonRenewing => WebhookEvent::AppStoreNonRenewing(purchase(&body)?),
            AppStoreKind::Expiration => WebhookEvent::AppStoreExpiration(purchase(&body)?),
            AppStoreKind::BillingIssue => WebhookEvent::AppStoreBillingIssue(purchase(&body)?),
        };

        Ok(DecodedEvent::Recognized(ProviderEvent {
            id: body.id,
            event_type: body.event_type,
            occurred_at,
            event,
        }))
    }
}

fn purchase(body: &AppStoreEventBody) -> Result<AppStorePurchase, WebhookError> {
    let app_user_id = body
        .app_user_id
        .as_deref()
        .ok_or(WebhookError::MissingField("event.app_user_id"))?;
    let app_user_id = UserId::new(app_user_id).map_err(|e| WebhookError::InvalidField {
        field: "event.app_user_id",
        reason: e.to_string(),
    })?;
    let product_id = body
        .product_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .ok_or(WebhookError::MissingField("event.product_id"))?;

    Ok(AppStorePurchase {
        app_user_id,
        product_id,
        original_transaction_id: body
            .original_transaction_id
            .clone()
            .or_else(|| body.transaction_id.clone()),
        purchased_at: millis(body.purchased_at_ms, "event.purchased_at_ms")?,
        expiration_at: millis(body.expiration_at_ms, "event.expiration_at_ms")?,
        environment: body.environment.clone(),
    })
}

fn millis(value: Option<i64>, field: &'static str) -> Result<Option<Timestamp>, WebhookError> {
    match value {
        None => Ok(None),
        Some(ms) => Timestamp::from_unix_millis(ms)
            .map(Some)
            .ok_or_else(|| WebhookError::InvalidField {
                field,
                reason: format!("{} is not a valid unix time", ms),
            }),
    }
}
