//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against the Stripe REST API.
//! Webhook verification lives in the domain verifier; this adapter only
//! makes outbound calls.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key);
//! let adapter = StripePaymentAdapter::new(config)?;
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::domain::subscription::{CheckoutMode, ProviderStatus};
use crate::ports::{
    CheckoutLineItem, CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentErrorCode,
    PaymentProvider, PortalSession, ProviderSubscription,
};

use super::webhook_types::{
    StripeCheckoutSession, StripeErrorBody, StripeLineItem, StripeList, StripePortalSession,
    StripeSubscription,
};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Per-request timeout for outbound calls.
    timeout: Duration,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::network(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, PaymentError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_response(response).await.map(Some)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        parse_response(response).await
    }
}

/// Maps a Stripe response to the body type or a `PaymentError`.
async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, error = %text, "Stripe API call failed");
        return Err(api_error(status, &text));
    }

    response.json().await.map_err(|e| {
        PaymentError::new(
            PaymentErrorCode::ProviderError,
            format!("Failed to parse Stripe response: {}", e),
        )
    })
}

fn api_error(status: reqwest::StatusCode, body: &str) -> PaymentError {
    let code = match status.as_u16() {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        400 | 402 => PaymentErrorCode::InvalidRequest,
        404 => PaymentErrorCode::NotFound,
        429 => PaymentErrorCode::RateLimitExceeded,
        _ => PaymentErrorCode::ProviderError,
    };

    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| format!("Stripe API error ({})", status));
            let err = PaymentError::new(code, message);
            match parsed.error.code.or(parsed.error.error_type) {
                Some(provider_code) => err.with_provider_code(provider_code),
                None => err,
            }
        }
        Err(_) => PaymentError::new(code, format!("Stripe API error ({}): {}", status, body)),
    }
}

/// Form parameters for a checkout session.
fn checkout_params(request: &CreateCheckoutRequest) -> Vec<(String, String)> {
    let mode = match request.mode {
        CheckoutMode::Subscription => "subscription",
        CheckoutMode::Payment => "payment",
    };

    let mut params = vec![
        ("mode".to_string(), mode.to_string()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    if let Some(customer) = &request.customer_id {
        params.push(("customer".to_string(), customer.clone()));
    }

    let mut metadata: Vec<_> = request.metadata.iter().collect();
    metadata.sort();
    for (key, value) in metadata {
        params.push((format!("metadata[{}]", key), value.clone()));
        // Subscription objects carry the correlation too, for support lookups.
        if request.mode == CheckoutMode::Subscription {
            params.push((format!("subscription_data[metadata][{}]", key), value.clone()));
        }
    }

    params
}

impl From<StripeSubscription> for ProviderSubscription {
    fn from(sub: StripeSubscription) -> Self {
        Self {
            price_id: sub.price_id(),
            current_period_end: sub.current_period_end(),
            cancel_at: sub.effective_cancel_at(),
            status: ProviderStatus::parse(&sub.status),
            id: sub.id,
            customer_id: sub.customer,
        }
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        let sub: Option<StripeSubscription> = self
            .get(&format!("/v1/subscriptions/{}", subscription_id), &[])
            .await?;
        Ok(sub.map(ProviderSubscription::from))
    }

    async fn list_checkout_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<CheckoutLineItem>, PaymentError> {
        let items: Option<StripeList<StripeLineItem>> = self
            .get(
                &format!("/v1/checkout/sessions/{}/line_items", session_id),
                &[("limit", "10")],
            )
            .await?;

        Ok(items
            .unwrap_or_default()
            .data
            .into_iter()
            .filter_map(|item| {
                item.price.map(|price| CheckoutLineItem {
                    price_id: price.id,
                    quantity: item.quantity,
                })
            })
            .collect())
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let session: StripeCheckoutSession = self
            .post("/v1/checkout/sessions", &checkout_params(&request))
            .await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::provider("Checkout session returned without a URL"))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let session: StripePortalSession = self
            .post(
                "/v1/billing_portal/sessions",
                &[
                    ("customer".to_string(), customer_id.to_string()),
                    ("return_url".to_string(), return_url.to_string()),
                ],
            )
            .await?;

        Ok(PortalSession {
            id: session.id,
            url: session.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(mode: CheckoutMode) -> CreateCheckoutRequest {
        let mut metadata = HashMap::new();
        metadata.insert("principalId".to_string(), "u-1".to_string());
        metadata.insert("principalType".to_string(), "user".to_string());
        CreateCheckoutRequest {
            price_id: "price_1".to_string(),
            mode,
            customer_id: Some("cus_1".to_string()),
            success_url: "https://app.example.com/ok".to_string(),
            cancel_url: "https://app.example.com/cancel".to_string(),
            metadata,
        }
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn checkout_params_carry_mode_and_metadata() {
        let params = checkout_params(&request(CheckoutMode::Payment));

        assert_eq!(param(&params, "mode"), Some("payment"));
        assert_eq!(param(&params, "customer"), Some("cus_1"));
        assert_eq!(param(&params, "metadata[principalId]"), Some("u-1"));
        assert_eq!(param(&params, "subscription_data[metadata][principalId]"), None);
    }

    #[test]
    fn subscription_checkout_copies_metadata_to_subscription() {
        let params = checkout_params(&request(CheckoutMode::Subscription));
        assert_eq!(
            param(&params, "subscription_data[metadata][principalType]"),
            Some("user")
        );
    }

    #[test]
    fn api_error_parses_stripe_body() {
        let err = api_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"type":"invalid_request_error","code":"resource_missing","message":"No such price: 'price_x'"}}"#,
        );

        assert_eq!(err.code, PaymentErrorCode::InvalidRequest);
        assert_eq!(err.message, "No such price: 'price_x'");
        assert_eq!(err.provider_code.as_deref(), Some("resource_missing"));
    }

    #[test]
    fn rate_limit_is_retryable() {
        let err = api_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_retryable());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = StripeConfig::new(SecretString::new("sk_test_secret".to_string()));
        assert!(!format!("{:?}", config).contains("sk_test_secret"));
    }
}
