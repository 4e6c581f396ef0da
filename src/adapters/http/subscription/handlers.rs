//! HTTP handlers for webhook and session endpoints.
//!
//! These handlers connect Axum routes to the subscription command handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::handlers::subscription::{
    CreateCheckoutSessionCommand, CreateCheckoutSessionHandler, CreatePortalSessionCommand,
    CreatePortalSessionHandler, HandleAppStoreWebhookCommand, HandleAppStoreWebhookHandler,
    HandleStripeWebhookCommand, HandleStripeWebhookHandler, SessionError,
};
use crate::domain::subscription::{WebhookError, WebhookOutcome};

use super::dto::{
    CreateCheckoutRequest, CreatePortalRequest, ErrorResponse, HealthResponse, SessionResponse,
    WebhookAck,
};

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const APP_STORE_SIGNATURE_HEADER: &str = "AppStore-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state.
///
/// Cloned per request; every handler sits behind an `Arc`.
#[derive(Clone)]
pub struct SubscriptionAppState {
    pub stripe_webhook: Arc<HandleStripeWebhookHandler>,
    pub app_store_webhook: Arc<HandleAppStoreWebhookHandler>,
    pub create_checkout: Arc<CreateCheckoutSessionHandler>,
    pub create_portal: Arc<CreatePortalSessionHandler>,
    /// Per-delivery deadline for webhook processing.
    pub request_timeout: Duration,
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/stripe
pub async fn handle_stripe_webhook(
    State(state): State<SubscriptionAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let cmd = HandleStripeWebhookCommand {
        payload: body.to_vec(),
        signature: signature(&headers, STRIPE_SIGNATURE_HEADER)?,
    };
    let outcome = with_deadline(state.request_timeout, state.stripe_webhook.handle(cmd)).await?;
    Ok(Json(WebhookAck::from(outcome)))
}

/// POST /webhooks/app-store
pub async fn handle_app_store_webhook(
    State(state): State<SubscriptionAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let cmd = HandleAppStoreWebhookCommand {
        payload: body.to_vec(),
        signature: signature(&headers, APP_STORE_SIGNATURE_HEADER)?,
    };
    let outcome =
        with_deadline(state.request_timeout, state.app_store_webhook.handle(cmd)).await?;
    Ok(Json(WebhookAck::from(outcome)))
}

fn signature(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| WebhookError::MalformedSignatureHeader(format!("missing {} header", name)))
}

async fn with_deadline<F>(deadline: Duration, work: F) -> Result<WebhookOutcome, WebhookError>
where
    F: std::future::Future<Output = Result<WebhookOutcome, WebhookError>>,
{
    match tokio::time::timeout(deadline, work).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(deadline_ms = deadline.as_millis() as u64, "Webhook processing deadline exceeded");
            Err(WebhookError::DeadlineExceeded)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Session Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /subscriptions/checkout
pub async fn create_checkout(
    State(state): State<SubscriptionAppState>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, SessionApiError> {
    let invalid = |e: crate::domain::foundation::ValidationError| {
        SessionError::Validation(e.to_string())
    };
    let cmd = CreateCheckoutSessionCommand {
        principal: request.principal.to_principal().map_err(invalid)?,
        tier: request.tier,
        billing_interval: request.billing_interval,
        initiated_by: request.initiated_by().map_err(invalid)?,
        duration_months: request.duration_months,
        expiration_date: request.expiration_date(),
    };

    let session = state.create_checkout.handle(cmd).await?;

    let response = SessionResponse {
        session_id: session.id,
        url: session.url,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /subscriptions/portal
pub async fn create_portal(
    State(state): State<SubscriptionAppState>,
    Json(request): Json<CreatePortalRequest>,
) -> Result<impl IntoResponse, SessionApiError> {
    let cmd = CreatePortalSessionCommand {
        principal: request
            .principal
            .to_principal()
            .map_err(|e| SessionError::Validation(e.to_string()))?,
        return_url: request.return_url,
    };

    let session = state.create_portal.handle(cmd).await?;

    let response = SessionResponse {
        session_id: session.id,
        url: session.url,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Converts webhook pipeline errors to HTTP responses.
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, status = %status, "Webhook delivery failed");
        }
        let body = ErrorResponse::new(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

/// Converts session errors to HTTP responses.
pub struct SessionApiError(SessionError);

impl From<SessionError> for SessionApiError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for SessionApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let body = ErrorResponse::new(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}
