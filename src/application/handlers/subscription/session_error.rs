//! Errors from checkout and portal session creation.
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | UnknownPrice | 400 |
//! | NoBillingCustomer | 400 |
//! | PrincipalNotFound | 404 |
//! | Provider | 502 |
//! | Store | 500 |

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;
use crate::domain::subscription::{BillingInterval, Plan, PrincipalRef};
use crate::ports::PaymentError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Principal not found: {0}")]
    PrincipalNotFound(PrincipalRef),

    #[error("No price configured for {plan} billed per {interval}")]
    UnknownPrice {
        plan: Plan,
        interval: BillingInterval,
    },

    #[error("{0} has no billing customer")]
    NoBillingCustomer(PrincipalRef),

    #[error("Payment provider error: {0}")]
    Provider(#[from] PaymentError),

    #[error("Store error: {0}")]
    Store(String),
}

impl SessionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::Validation(_)
            | SessionError::UnknownPrice { .. }
            | SessionError::NoBillingCustomer(_) => StatusCode::BAD_REQUEST,
            SessionError::PrincipalNotFound(_) => StatusCode::NOT_FOUND,
            SessionError::Provider(_) => StatusCode::BAD_GATEWAY,
            SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Validation(_) => "VALIDATION_FAILED",
            SessionError::PrincipalNotFound(_) => "NOT_FOUND",
            SessionError::UnknownPrice { .. } => "UNKNOWN_PRICE",
            SessionError::NoBillingCustomer(_) => "NO_BILLING_CUSTOMER",
            SessionError::Provider(_) => "PROVIDER_ERROR",
            SessionError::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<DomainError> for SessionError {
    fn from(err: DomainError) -> Self {
        SessionError::Store(err.to_string())
    }
}
