//! Subscription store port.
//!
//! Contract for the user and community record stores this engine reads
//! and writes. Only the subscription sub-record (plus `updatedAt` and,
//! for communities, `subscriptionCreatedBy`) is ever touched.
//!
//! # Design
//!
//! - **Filtered update**: `apply_patch` writes only the fields the patch
//!   carries, as one atomic statement per record.
//! - **No locking**: concurrent deliveries for one principal race on final
//!   write order; the last write wins.
//! - **No deletes**: records are reset to free, never removed.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::subscription::{PrincipalRef, Subscription, SubscriptionPatch};

/// A record found through its provider subscription id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedSubscription {
    pub principal: PrincipalRef,
    pub subscription: Subscription,
}

/// Port over the user and community record stores.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Current subscription of a principal.
    ///
    /// Returns `None` if the principal does not exist. A principal that
    /// never paid returns the free record.
    async fn find_by_principal(
        &self,
        principal: &PrincipalRef,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Finds the principal whose record carries this provider subscription id.
    ///
    /// Users are searched before communities.
    async fn find_by_external_subscription_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<LocatedSubscription>, DomainError>;

    /// Writes the patch's fields to the principal's record.
    ///
    /// Returns `false` if no record matched (a lookup miss, not an error).
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn apply_patch(
        &self,
        principal: &PrincipalRef,
        patch: &SubscriptionPatch,
    ) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety test
    #[test]
    fn subscription_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn SubscriptionStore) {}
    }
}
