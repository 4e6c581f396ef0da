//! CreateCheckoutSessionHandler - Starts a primary-provider checkout.
//!
//! The session carries the checkout correlation as metadata so the
//! completion webhook can find its principal again.

use std::sync::Arc;

use super::session_error::SessionError;
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{
    BillingInterval, CheckoutCorrelation, CheckoutMode, Plan, PriceCatalog, PrincipalRef,
    SubscriptionSource,
};
use crate::ports::{CheckoutSession, CreateCheckoutRequest, PaymentProvider, SubscriptionStore};

/// Command to start a checkout.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSessionCommand {
    pub principal: PrincipalRef,
    pub tier: Plan,
    pub billing_interval: BillingInterval,
    /// Paying user for community promotions.
    pub initiated_by: Option<UserId>,
    pub duration_months: Option<u32>,
    /// Explicit promotion end, used when the purchase replaces the window.
    pub expiration_date: Option<Timestamp>,
}

pub struct CreateCheckoutSessionHandler {
    store: Arc<dyn SubscriptionStore>,
    payment_provider: Arc<dyn PaymentProvider>,
    catalog: Arc<PriceCatalog>,
    success_url: String,
    cancel_url: String,
}

impl CreateCheckoutSessionHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        payment_provider: Arc<dyn PaymentProvider>,
        catalog: Arc<PriceCatalog>,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            payment_provider,
            catalog,
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateCheckoutSessionCommand,
    ) -> Result<CheckoutSession, SessionError> {
        // 1. Only paid tiers go through checkout
        if !cmd.tier.is_paid() {
            return Err(SessionError::Validation(format!(
                "tier '{}' cannot be purchased",
                cmd.tier
            )));
        }
        if cmd.duration_months == Some(0) {
            return Err(SessionError::Validation(
                "duration_months must be at least 1".to_string(),
            ));
        }

        // 2. Principal must exist
        let current = self
            .store
            .find_by_principal(&cmd.principal)
            .await?
            .ok_or_else(|| SessionError::PrincipalNotFound(cmd.principal.clone()))?;

        // 3. Catalog decides the price
        let price_id = self
            .catalog
            .price_for(SubscriptionSource::Stripe, cmd.tier, cmd.billing_interval)
            .ok_or(SessionError::UnknownPrice {
                plan: cmd.tier,
                interval: cmd.billing_interval,
            })?
            .to_string();

        // Communities buy one-time promotions; users subscribe.
        let mode = match cmd.principal {
            PrincipalRef::User(_) => CheckoutMode::Subscription,
            PrincipalRef::Community(_) => CheckoutMode::Payment,
        };

        let correlation = CheckoutCorrelation {
            principal: cmd.principal.clone(),
            tier: Some(cmd.tier),
            billing_interval: Some(cmd.billing_interval),
            initiated_by: cmd.initiated_by,
            duration_months: cmd.duration_months,
            expiration_date: cmd.expiration_date,
        };

        // 4. Create the session
        let session = self
            .payment_provider
            .create_checkout_session(CreateCheckoutRequest {
                price_id,
                mode,
                customer_id: current.external_customer_id,
                success_url: self.success_url.clone(),
                cancel_url: self.cancel_url.clone(),
                metadata: correlation.to_metadata(),
            })
            .await?;

        tracing::info!(
            principal = %cmd.principal,
            tier = %cmd.tier,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::foundation::CommunityId;
    use crate::domain::subscription::{metadata_keys, Subscription};

    const CATALOG: &str = r#"
prices:
  - { id: price_premium_year, plan: premium, interval: year }
  - { id: price_standard_month, plan: standard, interval: month }
"#;

    fn handler(store: &InMemorySubscriptionStore, provider: &MockPaymentProvider) -> CreateCheckoutSessionHandler {
        CreateCheckoutSessionHandler::new(
            Arc::new(store.clone()),
            Arc::new(provider.clone()),
            Arc::new(PriceCatalog::from_yaml_str(CATALOG).unwrap()),
            "https://app.example.com/billing/success",
            "https://app.example.com/billing/cancel",
        )
    }

    fn user() -> UserId {
        UserId::new("u-1").unwrap()
    }

    fn command(principal: PrincipalRef, tier: Plan, interval: BillingInterval) -> CreateCheckoutSessionCommand {
        CreateCheckoutSessionCommand {
            principal,
            tier,
            billing_interval: interval,
            initiated_by: None,
            duration_months: None,
            expiration_date: None,
        }
    }

    #[tokio::test]
    async fn user_checkout_is_subscription_mode_with_correlation() {
        let store = InMemorySubscriptionStore::new();
        let provider = MockPaymentProvider::new();
        store
            .insert_user(
                &user(),
                Subscription {
                    external_customer_id: Some("cus_1".to_string()),
                    ..Subscription::free()
                },
            )
            .await;

        let session = handler(&store, &provider)
            .handle(command(PrincipalRef::User(user()), Plan::Premium, BillingInterval::Year))
            .await
            .unwrap();

        assert!(!session.url.is_empty());
        let request = provider.last_checkout_request().unwrap();
        assert_eq!(request.mode, CheckoutMode::Subscription);
        assert_eq!(request.price_id, "price_premium_year");
        assert_eq!(request.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(
            request.metadata.get(metadata_keys::PRINCIPAL_ID).map(String::as_str),
            Some("u-1")
        );
    }

    #[tokio::test]
    async fn community_checkout_is_payment_mode() {
        let store = InMemorySubscriptionStore::new();
        let provider = MockPaymentProvider::new();
        let community = CommunityId::new("c-1").unwrap();
        store.insert_community(&community, Subscription::free()).await;

        let mut cmd = command(PrincipalRef::Community(community), Plan::Standard, BillingInterval::Month);
        cmd.initiated_by = Some(user());
        cmd.duration_months = Some(3);
        handler(&store, &provider).handle(cmd).await.unwrap();

        let request = provider.last_checkout_request().unwrap();
        assert_eq!(request.mode, CheckoutMode::Payment);
        assert_eq!(
            request.metadata.get(metadata_keys::DURATION_MONTHS).map(String::as_str),
            Some("3")
        );
    }

    #[tokio::test]
    async fn free_tier_is_rejected() {
        let store = InMemorySubscriptionStore::new();
        let provider = MockPaymentProvider::new();

        let err = handler(&store, &provider)
            .handle(command(PrincipalRef::User(user()), Plan::Free, BillingInterval::Month))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_principal_is_not_found() {
        let store = InMemorySubscriptionStore::new();
        let provider = MockPaymentProvider::new();

        let err = handler(&store, &provider)
            .handle(command(PrincipalRef::User(user()), Plan::Premium, BillingInterval::Year))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::PrincipalNotFound(_)));
    }

    #[tokio::test]
    async fn unpriced_plan_is_rejected() {
        let store = InMemorySubscriptionStore::new();
        let provider = MockPaymentProvider::new();
        store.insert_user(&user(), Subscription::free()).await;

        let err = handler(&store, &provider)
            .handle(command(PrincipalRef::User(user()), Plan::Elite, BillingInterval::Month))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::UnknownPrice { .. }));
    }
}
