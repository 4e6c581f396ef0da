//! Entitlement fallback on personal downgrades.
//!
//! Before a user's paid subscription collapses to free, the entitlement
//! store is consulted: an independently granted plan survives the
//! cancellation. A failed lookup fails open to free so the cancellation
//! is still recorded.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{Plan, SubscriptionPatch, SubscriptionSource};
use crate::ports::EntitlementReader;

/// What a downgrade resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackResolution {
    /// An active entitlement keeps the user on this plan.
    Entitled(Plan),
    /// No entitlement; the user is free.
    Free,
    /// The lookup failed; treated as free.
    FailedOpen,
}

impl FallbackResolution {
    /// Patch collapsing a personal subscription to its post-cancellation state.
    pub fn into_patch(self, at: Timestamp) -> SubscriptionPatch {
        match self {
            FallbackResolution::Entitled(plan) => SubscriptionPatch::at(at)
                .active(true)
                .plan(plan)
                .source(SubscriptionSource::None)
                .cancel_at(None)
                .expiration_date(None),
            FallbackResolution::Free | FallbackResolution::FailedOpen => {
                SubscriptionPatch::downgrade_to_free(at)
            }
        }
    }
}

pub struct EntitlementFallback {
    reader: Arc<dyn EntitlementReader>,
}

impl EntitlementFallback {
    pub fn new(reader: Arc<dyn EntitlementReader>) -> Self {
        Self { reader }
    }

    /// Resolves the plan a user keeps once their paid subscription ends.
    pub async fn resolve(&self, user_id: &UserId) -> FallbackResolution {
        match self.reader.find_active_for_user(user_id).await {
            Ok(Some(entitlement)) if entitlement.active && entitlement.plan.is_paid() => {
                tracing::info!(
                    user_id = %user_id,
                    plan = %entitlement.plan,
                    "Active entitlement preserved on downgrade"
                );
                FallbackResolution::Entitled(entitlement.plan)
            }
            Ok(_) => FallbackResolution::Free,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "Entitlement lookup failed; downgrading to free"
                );
                FallbackResolution::FailedOpen
            }
        }
    }
}
