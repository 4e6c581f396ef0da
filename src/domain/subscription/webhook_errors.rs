//! Webhook error types and processing outcomes.
//!
//! Status codes drive provider retry behavior:
//! - 2xx: acknowledged, no retry
//! - 4xx: rejected, no retry
//! - 5xx: processing failure, provider retries

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use super::principal::CorrelationError;
use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header present but not `t=..,v1=..[,v0=..]`.
    #[error("Malformed signature header: {0}")]
    MalformedSignatureHeader(String),

    /// HMAC did not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp older than the configured replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp too far in the future.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Authenticated body is not a provider event envelope at all.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Required field absent on an authentic event.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Required field present but unusable.
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Record store read or write failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Provider API call used for enrichment failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Delivery exceeded its processing deadline.
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl WebhookError {
    /// Returns true for authentication failures.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            WebhookError::MalformedSignatureHeader(_)
                | WebhookError::InvalidSignature
                | WebhookError::TimestampOutOfRange
                | WebhookError::InvalidTimestamp
        )
    }

    /// Returns true if the provider should redeliver.
    ///
    /// Decode failures on authentic events are retryable: the payload may
    /// have been produced mid-way through an upstream change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingField(_)
                | WebhookError::InvalidField { .. }
                | WebhookError::Store(_)
                | WebhookError::Provider(_)
                | WebhookError::DeadlineExceeded
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            // Auth failures - don't retry
            WebhookError::MalformedSignatureHeader(_)
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp => StatusCode::BAD_REQUEST,

            // Not an event envelope - don't retry
            WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,

            // Server errors - will retry
            WebhookError::MissingField(_)
            | WebhookError::InvalidField { .. }
            | WebhookError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::Provider(_) => StatusCode::BAD_GATEWAY,
            WebhookError::DeadlineExceeded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::MalformedSignatureHeader(_)
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp => "AUTHENTICATION_FAILED",
            WebhookError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            WebhookError::MissingField(_) | WebhookError::InvalidField { .. } => "DECODE_FAILED",
            WebhookError::Store(_) => "STORE_ERROR",
            WebhookError::Provider(_) => "PROVIDER_ERROR",
            WebhookError::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ProviderError => WebhookError::Provider(err.message),
            ErrorCode::Timeout => WebhookError::DeadlineExceeded,
            _ => WebhookError::Store(err.to_string()),
        }
    }
}

impl From<CorrelationError> for WebhookError {
    fn from(err: CorrelationError) -> Self {
        match err {
            CorrelationError::Missing(field) => WebhookError::MissingField(field),
            CorrelationError::Invalid { field, reason } => {
                WebhookError::InvalidField { field, reason }
            }
        }
    }
}

/// Successful result of processing one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// A patch was written.
    Applied,
    /// No principal matched; acknowledged so sandbox traffic cannot stall retries.
    LookupMiss,
    /// Recognized but deliberately not applied (ownership guard, no-op kind).
    Ignored,
    /// Already reflected in the record.
    Duplicate,
    /// Event kind this service does not handle.
    Acknowledged,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::LookupMiss => "lookup_miss",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Acknowledged => "acknowledged",
        }
    }
}
