//! Entitlement reader port.
//!
//! Entitlements are plan grants made independently of any paid
//! subscription (content-creator programs and the like). This engine
//! only reads them, to avoid stripping a grant when a payment lapses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::subscription::{Plan, PrincipalType};

/// Read-only entitlement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub target_type: PrincipalType,
    pub target_id: String,
    pub plan: Plan,
    pub active: bool,
}

#[async_trait]
pub trait EntitlementReader: Send + Sync {
    /// Active entitlement for a user, queried as
    /// `{targetType: "user", targetId, active: true}`.
    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Entitlement>, DomainError>;
}
