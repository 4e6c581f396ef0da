//! In-memory subscription store.
//!
//! Holds user and community records in process memory. Useful for tests
//! and local development without a database.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{CommunityId, DomainError, UserId};
use crate::domain::subscription::{PrincipalRef, Subscription, SubscriptionPatch};
use crate::ports::{LocatedSubscription, SubscriptionStore};

#[derive(Debug, Clone, Default)]
struct CommunityRecord {
    subscription: Subscription,
    created_by: Option<UserId>,
}

/// In-memory user and community records.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    users: Arc<RwLock<HashMap<String, Subscription>>>,
    communities: Arc<RwLock<HashMap<String, CommunityRecord>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user with the given subscription.
    pub async fn insert_user(&self, user_id: &UserId, subscription: Subscription) {
        self.users
            .write()
            .await
            .insert(user_id.to_string(), subscription);
    }

    /// Registers a community with the given subscription.
    pub async fn insert_community(&self, community_id: &CommunityId, subscription: Subscription) {
        self.communities.write().await.insert(
            community_id.to_string(),
            CommunityRecord {
                subscription,
                created_by: None,
            },
        );
    }

    pub async fn user(&self, user_id: &UserId) -> Option<Subscription> {
        self.users.read().await.get(user_id.as_str()).cloned()
    }

    pub async fn community(&self, community_id: &CommunityId) -> Option<Subscription> {
        self.communities
            .read()
            .await
            .get(community_id.as_str())
            .map(|r| r.subscription.clone())
    }

    /// Who paid for the community's current promotion.
    pub async fn community_created_by(&self, community_id: &CommunityId) -> Option<UserId> {
        self.communities
            .read()
            .await
            .get(community_id.as_str())
            .and_then(|r| r.created_by.clone())
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn find_by_principal(
        &self,
        principal: &PrincipalRef,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(match principal {
            PrincipalRef::User(id) => self.user(id).await,
            PrincipalRef::Community(id) => self.community(id).await,
        })
    }

    async fn find_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<LocatedSubscription>, DomainError> {
        let matches = |s: &Subscription| {
            s.external_subscription_id.as_deref() == Some(external_subscription_id)
        };

        {
            let users = self.users.read().await;
            let mut found: Vec<_> = users.iter().filter(|(_, s)| matches(s)).collect();
            found.sort_by(|a, b| a.0.cmp(b.0));
            if let Some((id, subscription)) = found.first() {
                return Ok(Some(LocatedSubscription {
                    principal: PrincipalRef::User(UserId::new(id.as_str())?),
                    subscription: (*subscription).clone(),
                }));
            }
        }

        let communities = self.communities.read().await;
        let mut found: Vec<_> = communities
            .iter()
            .filter(|(_, r)| matches(&r.subscription))
            .collect();
        found.sort_by(|a, b| a.0.cmp(b.0));
        match found.first() {
            Some((id, record)) => Ok(Some(LocatedSubscription {
                principal: PrincipalRef::Community(CommunityId::new(id.as_str())?),
                subscription: record.subscription.clone(),
            })),
            None => Ok(None),
        }
    }

    async fn apply_patch(
        &self,
        principal: &PrincipalRef,
        patch: &SubscriptionPatch,
    ) -> Result<bool, DomainError> {
        match principal {
            PrincipalRef::User(id) => {
                let mut users = self.users.write().await;
                match users.get_mut(id.as_str()) {
                    Some(subscription) => {
                        patch.apply_to(subscription);
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            PrincipalRef::Community(id) => {
                let mut communities = self.communities.write().await;
                match communities.get_mut(id.as_str()) {
                    Some(record) => {
                        patch.apply_to(&mut record.subscription);
                        if let Some(user) = &patch.created_by {
                            record.created_by = Some(user.clone());
                        }
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::Plan;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn with_external_id(id: &str) -> Subscription {
        Subscription {
            active: true,
            plan: Plan::Premium,
            external_subscription_id: Some(id.to_string()),
            ..Subscription::free()
        }
    }

    #[tokio::test]
    async fn patch_on_missing_principal_reports_miss() {
        let store = InMemorySubscriptionStore::new();

        let applied = store
            .apply_patch(
                &PrincipalRef::User(user("ghost")),
                &SubscriptionPatch::at(Timestamp::now()).active(true),
            )
            .await
            .unwrap();

        assert!(!applied);
    }

    #[tokio::test]
    async fn locates_users_before_communities() {
        let store = InMemorySubscriptionStore::new();
        let community = CommunityId::new("c-1").unwrap();
        store.insert_community(&community, with_external_id("sub_shared")).await;
        store.insert_user(&user("u-1"), with_external_id("sub_shared")).await;

        let located = store
            .find_by_external_subscription_id("sub_shared")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(located.principal, PrincipalRef::User(user("u-1")));
    }

    #[tokio::test]
    async fn locates_community_by_external_id() {
        let store = InMemorySubscriptionStore::new();
        let community = CommunityId::new("c-1").unwrap();
        store.insert_community(&community, with_external_id("cs_123")).await;

        let located = store.find_by_external_subscription_id("cs_123").await.unwrap();

        assert_eq!(
            located.map(|l| l.principal),
            Some(PrincipalRef::Community(community))
        );
    }

    #[tokio::test]
    async fn community_patch_records_creator() {
        let store = InMemorySubscriptionStore::new();
        let community = CommunityId::new("c-1").unwrap();
        store.insert_community(&community, Subscription::free()).await;

        let patch = SubscriptionPatch::at(Timestamp::now())
            .active(true)
            .created_by(Some(user("payer")));
        store
            .apply_patch(&PrincipalRef::Community(community.clone()), &patch)
            .await
            .unwrap();

        assert_eq!(store.community_created_by(&community).await, Some(user("payer")));
        assert!(store.community(&community).await.unwrap().active);
    }
}
