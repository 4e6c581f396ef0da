//! HTTP DTOs for webhook and session endpoints.
//!
//! These types define the JSON boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CommunityId, Timestamp, UserId, ValidationError};
use crate::domain::subscription::{
    BillingInterval, Plan, PrincipalRef, PrincipalType, WebhookOutcome,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Identifies the user or community a session is for.
#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalDto {
    pub principal_type: PrincipalType,
    pub principal_id: String,
}

impl PrincipalDto {
    pub fn to_principal(&self) -> Result<PrincipalRef, ValidationError> {
        Ok(match self.principal_type {
            PrincipalType::User => PrincipalRef::User(UserId::new(self.principal_id.clone())?),
            PrincipalType::Community => {
                PrincipalRef::Community(CommunityId::new(self.principal_id.clone())?)
            }
        })
    }
}

/// Request to start a checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckoutRequest {
    #[serde(flatten)]
    pub principal: PrincipalDto,
    pub tier: Plan,
    pub billing_interval: BillingInterval,
    /// Paying user for community promotions.
    #[serde(default)]
    pub initiated_by: Option<String>,
    #[serde(default)]
    pub duration_months: Option<u32>,
    /// RFC 3339 promotion end.
    #[serde(default)]
    pub expiration_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl CreateCheckoutRequest {
    pub fn initiated_by(&self) -> Result<Option<UserId>, ValidationError> {
        self.initiated_by.clone().map(UserId::new).transpose()
    }

    pub fn expiration_date(&self) -> Option<Timestamp> {
        self.expiration_date.map(Timestamp::from_datetime)
    }
}

/// Request to open the billing portal.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePortalRequest {
    #[serde(flatten)]
    pub principal: PrincipalDto,
    #[serde(default)]
    pub return_url: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        Self {
            received: true,
            outcome: outcome.as_str(),
        }
    }
}

/// Hosted session the client should be redirected to.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error envelope: `{"error": {"code", "message"}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
