//! In-memory entitlement reader.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::subscription::PrincipalType;
use crate::ports::{Entitlement, EntitlementReader};

#[derive(Debug, Clone, Default)]
pub struct InMemoryEntitlementReader {
    entitlements: Arc<RwLock<Vec<Entitlement>>>,
}

impl InMemoryEntitlementReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, entitlement: Entitlement) {
        self.entitlements.write().await.push(entitlement);
    }
}

#[async_trait]
impl EntitlementReader for InMemoryEntitlementReader {
    async fn find_active_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Entitlement>, DomainError> {
        Ok(self
            .entitlements
            .read()
            .await
            .iter()
            .find(|e| {
                e.active && e.target_type == PrincipalType::User && e.target_id == user_id.as_str()
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::Plan;

    fn entitlement(target: &str, active: bool) -> Entitlement {
        Entitlement {
            target_type: PrincipalType::User,
            target_id: target.to_string(),
            plan: Plan::Base,
            active,
        }
    }

    #[tokio::test]
    async fn inactive_entitlements_are_ignored() {
        let reader = InMemoryEntitlementReader::new();
        reader.grant(entitlement("u-1", false)).await;

        let found = reader
            .find_active_for_user(&UserId::new("u-1").unwrap())
            .await
            .unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn finds_active_entitlement_for_user() {
        let reader = InMemoryEntitlementReader::new();
        reader.grant(entitlement("u-2", false)).await;
        reader.grant(entitlement("u-1", true)).await;

        let found = reader
            .find_active_for_user(&UserId::new("u-1").unwrap())
            .await
            .unwrap();

        assert_eq!(found.map(|e| e.plan), Some(Plan::Base));
    }
}
