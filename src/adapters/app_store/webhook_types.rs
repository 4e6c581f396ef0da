//! App store webhook payload types.

use serde::Deserialize;

/// Envelope of one app store delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct AppStoreWebhookEnvelope {
    pub api_version: Option<String>,
    pub event: AppStoreEventBody,
}

/// Event body. Times are unix milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct AppStoreEventBody {
    pub id: String,

    /// Event type (e.g., "INITIAL_PURCHASE").
    #[serde(rename = "type")]
    pub event_type: String,

    pub app_user_id: Option<String>,
    pub product_id: Option<String>,

    /// Target product of a PRODUCT_CHANGE.
    pub new_product_id: Option<String>,

    pub original_transaction_id: Option<String>,
    pub transaction_id: Option<String>,
    pub purchased_at_ms: Option<i64>,
    pub expiration_at_ms: Option<i64>,
    pub event_timestamp_ms: Option<i64>,

    /// PRODUCTION or SANDBOX.
    pub environment: Option<String>,
}
