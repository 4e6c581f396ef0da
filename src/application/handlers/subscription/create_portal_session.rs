//! CreatePortalSessionHandler - Opens the provider's billing portal.

use std::sync::Arc;

use super::session_error::SessionError;
use crate::domain::subscription::PrincipalRef;
use crate::ports::{PaymentProvider, PortalSession, SubscriptionStore};

#[derive(Debug, Clone)]
pub struct CreatePortalSessionCommand {
    pub principal: PrincipalRef,
    /// Where the portal sends the customer back to. Falls back to the
    /// configured default.
    pub return_url: Option<String>,
}

pub struct CreatePortalSessionHandler {
    store: Arc<dyn SubscriptionStore>,
    payment_provider: Arc<dyn PaymentProvider>,
    default_return_url: String,
}

impl CreatePortalSessionHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        payment_provider: Arc<dyn PaymentProvider>,
        default_return_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            payment_provider,
            default_return_url: default_return_url.into(),
        }
    }

    pub async fn handle(
        &self,
        cmd: CreatePortalSessionCommand,
    ) -> Result<PortalSession, SessionError> {
        let current = self
            .store
            .find_by_principal(&cmd.principal)
            .await?
            .ok_or_else(|| SessionError::PrincipalNotFound(cmd.principal.clone()))?;

        let customer_id = current
            .external_customer_id
            .ok_or_else(|| SessionError::NoBillingCustomer(cmd.principal.clone()))?;

        let return_url = cmd
            .return_url
            .unwrap_or_else(|| self.default_return_url.clone());

        let session = self
            .payment_provider
            .create_portal_session(&customer_id, &return_url)
            .await?;

        tracing::info!(principal = %cmd.principal, session_id = %session.id, "Portal session created");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::foundation::UserId;
    use crate::domain::subscription::Subscription;

    fn user() -> UserId {
        UserId::new("u-1").unwrap()
    }

    fn handler(store: &InMemorySubscriptionStore) -> CreatePortalSessionHandler {
        CreatePortalSessionHandler::new(
            Arc::new(store.clone()),
            Arc::new(MockPaymentProvider::new()),
            "https://app.example.com/account",
        )
    }

    #[tokio::test]
    async fn customer_gets_portal_url() {
        let store = InMemorySubscriptionStore::new();
        store
            .insert_user(
                &user(),
                Subscription {
                    external_customer_id: Some("cus_1".to_string()),
                    ..Subscription::free()
                },
            )
            .await;

        let session = handler(&store)
            .handle(CreatePortalSessionCommand {
                principal: PrincipalRef::User(user()),
                return_url: None,
            })
            .await
            .unwrap();

        assert!(session.url.contains("cus_1"));
    }

    #[tokio::test]
    async fn principal_without_customer_is_rejected() {
        let store = InMemorySubscriptionStore::new();
        store.insert_user(&user(), Subscription::free()).await;

        let err = handler(&store)
            .handle(CreatePortalSessionCommand {
                principal: PrincipalRef::User(user()),
                return_url: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::NoBillingCustomer(_)));
    }
}
