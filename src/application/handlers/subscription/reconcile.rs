//! SubscriptionReconciler - applies canonical events to subscription records.
//!
//! Every event becomes at most one filtered update. Targets are located by
//! principal id (checkout completion, app store events) or by provider
//! subscription id (invoice and subscription events). A target that cannot
//! be found is a lookup miss: logged and acknowledged, never retried,
//! because sandbox traffic is expected to miss.
//!
//! Deliveries carry no sequence numbers. Two events for one principal
//! may apply out of order and the last write wins.

use std::sync::Arc;

use super::entitlement_fallback::EntitlementFallback;
use crate::domain::foundation::{StateMachine, Timestamp};
use crate::domain::subscription::{
    extend_promotion, AppStoreProductChange, AppStorePurchase, CheckoutCompleted, CheckoutMode,
    InvoiceEvent, PersonalLifecycle, PriceCatalog, PrincipalRef, PromotionPurchase, ProviderEvent,
    Subscription, SubscriptionChanged, SubscriptionPatch, SubscriptionSource, WebhookError,
    WebhookEvent, WebhookOutcome,
};
use crate::ports::SubscriptionStore;

/// What a failed payment does to a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentFailurePolicy {
    /// Collapse to free on the first failure.
    #[default]
    ImmediateDowngrade,
    /// Stay active until `days` after the failure, then rely on the
    /// provider's terminal event.
    GracePeriod { days: u32 },
}

impl PaymentFailurePolicy {
    pub fn from_grace_days(days: u32) -> Self {
        match days {
            0 => PaymentFailurePolicy::ImmediateDowngrade,
            days => PaymentFailurePolicy::GracePeriod { days },
        }
    }

    fn patch(&self, at: Timestamp) -> SubscriptionPatch {
        match self {
            PaymentFailurePolicy::ImmediateDowngrade => SubscriptionPatch::downgrade_to_free(at),
            PaymentFailurePolicy::GracePeriod { days } => {
                SubscriptionPatch::at(at).expiration_date(Some(at.add_days(i64::from(*days))))
            }
        }
    }
}

/// Where a computed patch goes, or why nothing is written.
enum Decision {
    Write {
        principal: PrincipalRef,
        current: Subscription,
        patch: SubscriptionPatch,
    },
    Skip(WebhookOutcome),
}

pub struct SubscriptionReconciler {
    store: Arc<dyn SubscriptionStore>,
    catalog: Arc<PriceCatalog>,
    fallback: EntitlementFallback,
    payment_failure_policy: PaymentFailurePolicy,
}

impl SubscriptionReconciler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        catalog: Arc<PriceCatalog>,
        fallback: EntitlementFallback,
    ) -> Self {
        Self {
            store,
            catalog,
            fallback,
            payment_failure_policy: PaymentFailurePolicy::default(),
        }
    }

    pub fn with_payment_failure_policy(mut self, policy: PaymentFailurePolicy) -> Self {
        self.payment_failure_policy = policy;
        self
    }

    /// Applies one decoded event.
    pub async fn reconcile(&self, event: &ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        let at = event.occurred_at;

        let decision = match &event.event {
            WebhookEvent::CheckoutCompleted(checkout) => self.checkout_completed(checkout, at).await?,
            WebhookEvent::InvoicePaid(invoice) => self.invoice_paid(invoice, at).await?,
            WebhookEvent::InvoiceFailed(invoice) => self.invoice_failed(invoice, at).await?,
            WebhookEvent::SubscriptionUpdated(changed) => {
                self.subscription_updated(changed, at).await?
            }
            WebhookEvent::SubscriptionDeleted(changed) => {
                self.subscription_deleted(changed, at).await?
            }
            WebhookEvent::TrialWillEnd(trial) => {
                tracing::info!(
                    event_id = %event.id,
                    subscription_id = %trial.subscription_id,
                    "Trial ending; nothing to record"
                );
                Decision::Skip(WebhookOutcome::Ignored)
            }
            WebhookEvent::AppStoreInitialPurchase(purchase)
            | WebhookEvent::AppStoreRenewal(purchase)
            | WebhookEvent::AppStoreUncancellation(purchase)
            | WebhookEvent::AppStoreNonRenewing(purchase) => {
                self.app_store_purchase(purchase, at).await?
            }
            WebhookEvent::AppStoreCancellation(purchase) => {
                self.app_store_cancellation(purchase, at).await?
            }
            WebhookEvent::AppStoreExpiration(purchase) => {
                self.app_store_expiration(purchase, at).await?
            }
            WebhookEvent::AppStoreBillingIssue(purchase) => {
                self.app_store_billing_issue(purchase, at).await?
            }
            WebhookEvent::AppStoreProductChange(change) => {
                self.app_store_product_change(change, at).await?
            }
        };

        match decision {
            Decision::Skip(outcome) => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    outcome = outcome.as_str(),
                    "Event not applied"
                );
                Ok(outcome)
            }
            Decision::Write {
                principal,
                current,
                patch,
            } => self.write(event, &principal, &current, patch).await,
        }
    }

    async fn write(
        &self,
        event: &ProviderEvent,
        principal: &PrincipalRef,
        current: &Subscription,
        patch: SubscriptionPatch,
    ) -> Result<WebhookOutcome, WebhookError> {
        let patch = patch.normalized(current);

        if principal.as_user().is_some() {
            let mut next = current.clone();
            patch.apply_to(&mut next);
            let from = PersonalLifecycle::classify(current, event.occurred_at);
            let to = PersonalLifecycle::classify(&next, event.occurred_at);
            if let Err(e) = from.transition_to(to) {
                // Out-of-order delivery; last write still wins.
                tracing::warn!(
                    event_id = %event.id,
                    principal = %principal,
                    error = %e,
                    "Unexpected lifecycle transition"
                );
            }
        }

        let applied = self.store.apply_patch(principal, &patch).await.map_err(|e| {
            tracing::error!(
                event_id = %event.id,
                principal = %principal,
                error = %e,
                "Failed to write subscription patch"
            );
            WebhookError::from(e)
        })?;

        if !applied {
            tracing::info!(event_id = %event.id, principal = %principal, "Principal vanished before write");
            return Ok(WebhookOutcome::LookupMiss);
        }

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            principal = %principal,
            fields = ?patch.field_names(),
            "Subscription patch applied"
        );
        Ok(WebhookOutcome::Applied)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Lookup
    // ════════════════════════════════════════════════════════════════════════════

    async fn by_principal(
        &self,
        principal: &PrincipalRef,
    ) -> Result<Option<Subscription>, WebhookError> {
        Ok(self.store.find_by_principal(principal).await?)
    }

    async fn by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<(PrincipalRef, Subscription)>, WebhookError> {
        Ok(self
            .store
            .find_by_external_subscription_id(subscription_id)
            .await?
            .map(|located| (located.principal, located.subscription)))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Primary Provider
    // ════════════════════════════════════════════════════════════════════════════

    async fn checkout_completed(
        &self,
        checkout: &CheckoutCompleted,
        at: Timestamp,
    ) -> Result<Decision, WebhookError> {
        let purchased = checkout
            .purchased
            .as_ref()
            .ok_or(WebhookError::MissingField("line_items.price"))?;
        let resolved = self.catalog.resolve(&purchased.price_id);
        let principal = checkout.correlation.principal.clone();

        let current = match self.by_principal(&principal).await? {
            Some(current) => current,
            None => return Ok(Decision::Skip(WebhookOutcome::LookupMiss)),
        };

        let patch = match &principal {
            PrincipalRef::User(_) => {
                let subscription_id = match checkout.mode {
                    CheckoutMode::Subscription => checkout
                        .subscription_id
                        .clone()
                        .ok_or(WebhookError::MissingField("subscription"))?,
                    CheckoutMode::Payment => checkout.session_id.clone(),
                };
                let mut patch = SubscriptionPatch::at(at)
                    .active(true)
                    .plan(resolved.plan)
                    .source(SubscriptionSource::Stripe)
                    .external_subscription_id(Some(subscription_id))
                    .external_customer_id(checkout.customer_id.clone())
                    .purchase_date(at)
                    .expiration_date(purchased.current_period_end)
                    .cancel_at(purchased.cancel_at);
                if resolved.is_known() {
                    patch = patch.is_annual(resolved.is_annual());
                }
                patch
            }
            PrincipalRef::Community(_) => {
                let external_id = checkout
                    .subscription_id
                    .clone()
                    .unwrap_or_else(|| checkout.session_id.clone());

                if current.active
                    && current.external_subscription_id.as_deref() == Some(external_id.as_str())
                {
                    return Ok(Decision::Skip(WebhookOutcome::Duplicate));
                }

                let tier = if resolved.is_known() {
                    resolved.plan
                } else {
                    checkout.correlation.tier.unwrap_or(resolved.plan)
                };
                let duration_months = checkout
                    .correlation
                    .duration_months
                    .or(resolved.interval.map(|i| i.months()))
                    .unwrap_or(1);
                let extension = extend_promotion(
                    &current,
                    &PromotionPurchase {
                        tier,
                        duration_months,
                        metadata_expiration: checkout.correlation.expiration_date,
                    },
                    at,
                );
                tracing::debug!(kind = ?extension.kind, "Promotion expiration computed");

                SubscriptionPatch::at(at)
                    .active(true)
                    .plan(resolved.plan)
                    .duration_months(Some(duration_months))
                    .source(SubscriptionSource::Stripe)
                    .external_subscription_id(Some(external_id))
                    .external_customer_id(checkout.customer_id.clone())
                    .purchase_date(at)
                    .expiration_date(Some(extension.expiration))
                    .cancel_at(None)
                    .created_by(checkout.correlation.initiated_by.clone())
            }
        };

        Ok(Decision::Write {
            principal,
            current,
            patch,
        })
    }

    async fn invoice_paid(
        &self,
        invoice: &InvoiceEvent,
        at: Timestamp,
    ) -> Result<Decision, WebhookError> {
        let Some(subscription_id) = invoice.subscription_id.as_deref() else {
            // One-time invoices are settled through checkout completion.
            return Ok(Decision::Skip(WebhookOutcome::Ignored));
        };
        let Some((principal, current)) = self.by_subscription_id(subscription_id).await? else {
            return Ok(Decision::Skip(WebhookOutcome::LookupMiss));
        };

        let mut patch = SubscriptionPatch::at(at)
            .active(true)
            .source(SubscriptionSource::Stripe)
            .external_customer_id(invoice.customer_id.clone());
        if let Some(period_end) = invoice.period_end {
            patch = patch.expiration_date(Some(period_end));
        }
        if let Some(price_id) = invoice.price_id.as_deref() {
            let resolved = self.catalog.resolve(price_id);
            patch = patch.plan(resolved.plan);
            if resolved.is_known() && principal.as_user().is_some() {
                patch = patch.is_annual(resolved.is_annual());
            }
        }

        Ok(Decision::Write {
            principal,
            current,
            patch,
        })
    }

    async fn invoice_failed(
        &self,
        invoice: &InvoiceEvent,
        at: Timestamp,
    ) -> Result<Decision, WebhookError> {
        let Some(subscription_id) = invoice.subscription_id.as_deref() else {
            return Ok(Decision::Skip(WebhookOutcome::Ignored));
        };
        let Some((principal, current)) = self.by_subscription_id(subscription_id).await? else {
            return Ok(Decision::Skip(WebhookOutcome::LookupMiss));
        };

        Ok(Decision::Write {
            principal,
            current,
            patch: self.payment_failure_policy.patch(at),
        })
    }

    async fn subscription_updated(
        &self,
        changed: &SubscriptionChanged,
        at: Timestamp,
    ) -> Result<Decision, WebhookError> {
        let Some((principal, current)) = self.by_subscription_id(&changed.subscription_id).await?
        else {
            return Ok(Decision::Skip(WebhookOutcome::LookupMiss));
        };

        let patch = if changed.status.is_live() {
            // A cleared cancel_at reactivates a pending cancellation.
            let mut patch = SubscriptionPatch::at(at)
                .active(true)
                .source(SubscriptionSource::Stripe)
                .external_customer_id(changed.customer_id.clone())
                .expiration_date(changed.current_period_end)
                .cancel_at(changed.cancel_at);
            if let Some(price_id) = changed.price_id.as_deref() {
                let resolved = self.catalog.resolve(price_id);
                patch = patch.plan(resolved.plan);
                if resolved.is_known() && principal.as_user().is_some() {
                    patch = patch.is_annual(resolved.is_annual());
                }
            }
            patch
        } else {
            // Dunning states are settled by invoice and deletion events.
            SubscriptionPatch::at(at).cancel_at(changed.cancel_at)
        };

        Ok(Decision::Write {
            principal,
            current,
            patch,
        })
    }

    async fn subscription_deleted(
        &self,
        changed: &SubscriptionChanged,
        at: Timestamp,
    ) -> Result<Decision, WebhookError> {
        let Some((principal, current)) = self.by_subscription_id(&changed.subscription_id).await?
        else {
            return Ok(Decision::Skip(WebhookOutcome::LookupMiss));
        };

        let patch = match &principal {
            PrincipalRef::User(user_id) => self.fallback.resolve(user_id).await.into_patch(at),
            PrincipalRef::Community(_) => SubscriptionPatch::downgrade_to_free(at),
        };

        Ok(Decision::Write {
            principal,
            current,
            patch,
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // App Store
    // ════════════════════════════════════════════════════════════════════════════

    async fn app_store_purchase(
        &self,
        purchase: &AppStorePurchase,
        at: Timestamp,
    ) -> Result<Decision, WebhookError> {
        let principal = PrincipalRef::User(purchase.app_user_id.clone());
        let Some(current) = self.by_principal(&principal).await? else {
            return Ok(Decision::Skip(WebhookOutcome::LookupMiss));
        };

        let resolved = self.catalog.resolve(&purchase.product_id);
        let mut patch = SubscriptionPatch::at(at)
            .active(true)
            .plan(resolved.plan)
            .source(SubscriptionSource::AppStore)
            .purchase_date(purchase.purchased_at.unwrap_or(at))
            .expiration_date(purchase.expiration_at)
            .cancel_at(None);
        if resolved.is_known() {
            patch = patch.is_annual(resolved.is_annual());
        }
        if let Some(transaction_id) = &purchase.original_transaction_id {
            patch = patch.external_subscription_id(Some(transaction_id.clone()));
        }

        Ok(Decision::Write {
            principal,
            current,
            patch,
        })
    }

    async fn app_store_cancellation(
        &self,
        purchase: &AppStorePurchase,
        at: Timestamp,
    ) -> Result<Decision, WebhookError> {
        let (principal, current) = match self.app_store_owned(purchase).await? {
            Ok(found) => found,
            Err(outcome) => return Ok(Decision::Skip(outcome)),
        };

        let patch = match purchase.expiration_at.filter(|exp| exp.is_after(&at)) {
            // Auto-renew off: access runs until the paid period ends.
            Some(expiration) => SubscriptionPatch::at(at).cancel_at(Some(expiration)),
            None => self
                .fallback
                .resolve(&purchase.app_user_id)
                .await
                .into_patch(at),
        };

        Ok(Decision::Write {
            principal,
            current,
            patch,
        })
    }

    async fn app_store_expiration(
        &self,
        purchase: &AppStorePurchase,
        at: Timestamp,
    ) -> Result<Decision, WebhookError> {
        let (principal, current) = match self.app_store_owned(purchase).await? {
            Ok(found) => found,
            Err(outcome) => return Ok(Decision::Skip(outcome)),
        };

        Ok(Decision::Write {
            principal,
            current,
            patch: self
                .fallback
                .resolve(&purchase.app_user_id)
                .await
                .into_patch(at),
        })
    }

    async fn app_store_billing_issue(
        &self,
        purchase: &AppStorePurchase,
        at: Timestamp,
    ) -> Result<Decision, WebhookError> {
        let (principal, current) = match self.app_store_owned(purchase).await? {
            Ok(found) => found,
            Err(outcome) => return Ok(Decision::Skip(outcome)),
        };

        Ok(Decision::Write {
            principal,
            current,
            patch: self.payment_failure_policy.patch(at),
        })
    }

    async fn app_store_product_change(
        &self,
        change: &AppStoreProductChange,
        at: Timestamp,
    ) -> Result<Decision, WebhookError> {
        let (principal, current) = match self.app_store_owned(&change.purchase).await? {
            Ok(found) => found,
            Err(outcome) => return Ok(Decision::Skip(outcome)),
        };

        let resolved = self.catalog.resolve(&change.new_product_id);
        if !resolved.is_known() {
            return Ok(Decision::Skip(WebhookOutcome::Ignored));
        }

        Ok(Decision::Write {
            principal,
            current,
            patch: SubscriptionPatch::at(at)
                .plan(resolved.plan)
                .is_annual(resolved.is_annual()),
        })
    }

    /// Loads the user an app store lapse event targets.
    ///
    /// Lapse events only apply while the app store owns the record (or
    /// nothing does), so they can never downgrade a primary-provider or
    /// entitlement-backed subscription.
    async fn app_store_owned(
        &self,
        purchase: &AppStorePurchase,
    ) -> Result<Result<(PrincipalRef, Subscription), WebhookOutcome>, WebhookError> {
        let principal = PrincipalRef::User(purchase.app_user_id.clone());
        let Some(current) = self.by_principal(&principal).await? else {
            return Ok(Err(WebhookOutcome::LookupMiss));
        };

        if current.active && current.source != SubscriptionSource::AppStore {
            tracing::info!(
                principal = %principal,
                owner = %current.source,
                "App store lapse ignored; record owned elsewhere"
            );
            return Ok(Err(WebhookOutcome::Ignored));
        }

        Ok(Ok((principal, current)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryEntitlementReader, InMemorySubscriptionStore};
    use crate::domain::foundation::{CommunityId, DomainError, UserId};
    use crate::domain::subscription::{
        CheckoutCorrelation, Plan, PrincipalType, ProviderStatus, PurchasedPrice,
        TrialWillEnd,
    };
    use crate::ports::{Entitlement, LocatedSubscription};
    use async_trait::async_trait;

    const CATALOG: &str = r#"
prices:
  - { id: price_base_month, plan: base, interval: month }
  - { id: price_premium_month, plan: premium, interval: month }
  - { id: price_premium_year, plan: premium, interval: year }
  - { id: price_standard, plan: standard, interval: month }
  - { id: price_basic, plan: basic, interval: month }
  - { id: price_community_premium, plan: premium, interval: month }
  - { id: premium_monthly, plan: premium, interval: month, provider: app_store }
  - { id: premium_plus_yearly, plan: premium_plus, interval: year, provider: app_store }
"#;

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        store: InMemorySubscriptionStore,
        entitlements: InMemoryEntitlementReader,
        reconciler: SubscriptionReconciler,
    }

    fn fixture() -> Fixture {
        fixture_with_policy(PaymentFailurePolicy::ImmediateDowngrade)
    }

    fn fixture_with_policy(policy: PaymentFailurePolicy) -> Fixture {
        let store = InMemorySubscriptionStore::new();
        let entitlements = InMemoryEntitlementReader::new();
        let reconciler = SubscriptionReconciler::new(
            Arc::new(store.clone()),
            Arc::new(PriceCatalog::from_yaml_str(CATALOG).unwrap()),
            EntitlementFallback::new(Arc::new(entitlements.clone())),
        )
        .with_payment_failure_policy(policy);
        Fixture {
            store,
            entitlements,
            reconciler,
        }
    }

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(1_710_000_000).unwrap()
    }

    fn user() -> UserId {
        UserId::new("u-1").unwrap()
    }

    fn community() -> CommunityId {
        CommunityId::new("c-1").unwrap()
    }

    fn event(event: WebhookEvent) -> ProviderEvent {
        ProviderEvent {
            id: "evt_1".to_string(),
            event_type: event.kind().to_string(),
            occurred_at: now(),
            event,
        }
    }

    fn stripe_premium(subscription_id: &str) -> Subscription {
        Subscription {
            active: true,
            plan: Plan::Premium,
            source: SubscriptionSource::Stripe,
            external_subscription_id: Some(subscription_id.to_string()),
            external_customer_id: Some("cus_1".to_string()),
            purchase_date: Some(now().add_days(-30)),
            expiration_date: Some(now().add_days(5)),
            ..Subscription::free()
        }
    }

    fn correlation(principal: PrincipalRef) -> CheckoutCorrelation {
        CheckoutCorrelation {
            principal,
            tier: None,
            billing_interval: None,
            initiated_by: None,
            duration_months: None,
            expiration_date: None,
        }
    }

    fn user_checkout(price_id: &str) -> WebhookEvent {
        WebhookEvent::CheckoutCompleted(CheckoutCompleted {
            session_id: "cs_1".to_string(),
            mode: CheckoutMode::Subscription,
            subscription_id: Some("sub_new".to_string()),
            customer_id: Some("cus_9".to_string()),
            correlation: CheckoutCorrelation {
                tier: Some(Plan::Elite),
                ..correlation(PrincipalRef::User(user()))
            },
            purchased: Some(PurchasedPrice {
                price_id: price_id.to_string(),
                current_period_end: Some(now().add_months(12)),
                cancel_at: None,
            }),
        })
    }

    fn community_checkout(session_id: &str, price_id: &str, months: u32) -> WebhookEvent {
        WebhookEvent::CheckoutCompleted(CheckoutCompleted {
            session_id: session_id.to_string(),
            mode: CheckoutMode::Payment,
            subscription_id: None,
            customer_id: Some("cus_c".to_string()),
            correlation: CheckoutCorrelation {
                initiated_by: Some(UserId::new("payer").unwrap()),
                duration_months: Some(months),
                ..correlation(PrincipalRef::Community(community()))
            },
            purchased: Some(PurchasedPrice {
                price_id: price_id.to_string(),
                current_period_end: None,
                cancel_at: None,
            }),
        })
    }

    fn changed(subscription_id: &str, status: ProviderStatus, cancel_at: Option<Timestamp>) -> SubscriptionChanged {
        SubscriptionChanged {
            subscription_id: subscription_id.to_string(),
            customer_id: Some("cus_1".to_string()),
            status,
            price_id: Some("price_premium_month".to_string()),
            current_period_end: Some(now().add_days(20)),
            cancel_at,
        }
    }

    fn app_purchase(product_id: &str) -> AppStorePurchase {
        AppStorePurchase {
            app_user_id: user(),
            product_id: product_id.to_string(),
            original_transaction_id: Some("1000000001".to_string()),
            purchased_at: Some(now()),
            expiration_at: Some(now().add_months(1)),
            environment: Some("PRODUCTION".to_string()),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Checkout Completion
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn checkout_plan_comes_from_catalog_not_metadata() {
        let f = fixture();
        f.store.insert_user(&user(), Subscription::free()).await;

        let outcome = f.reconciler.reconcile(&event(user_checkout("price_premium_year"))).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Applied);
        let record = f.store.user(&user()).await.unwrap();
        assert_eq!(record.plan, Plan::Premium);
        assert!(record.is_annual);
        assert!(record.active);
        assert_eq!(record.source, SubscriptionSource::Stripe);
        assert_eq!(record.external_subscription_id.as_deref(), Some("sub_new"));
        assert_eq!(record.external_customer_id.as_deref(), Some("cus_9"));
        assert_eq!(record.purchase_date, Some(now()));
        assert_eq!(record.updated_at, Some(now()));
    }

    #[tokio::test]
    async fn checkout_with_unknown_price_keeps_existing_plan() {
        let f = fixture();
        f.store
            .insert_user(
                &user(),
                Subscription {
                    plan: Plan::Base,
                    ..Subscription::free()
                },
            )
            .await;

        f.reconciler.reconcile(&event(user_checkout("price_unlisted"))).await.unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert_eq!(record.plan, Plan::Base);
        assert!(record.active);
    }

    #[tokio::test]
    async fn checkout_for_unknown_user_is_lookup_miss() {
        let f = fixture();

        let outcome = f.reconciler.reconcile(&event(user_checkout("price_base_month"))).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::LookupMiss);
    }

    #[tokio::test]
    async fn checkout_without_price_is_missing_field() {
        let f = fixture();
        f.store.insert_user(&user(), Subscription::free()).await;
        let mut checkout = user_checkout("price_base_month");
        if let WebhookEvent::CheckoutCompleted(c) = &mut checkout {
            c.purchased = None;
        }

        let result = f.reconciler.reconcile(&event(checkout)).await;

        assert!(matches!(result, Err(WebhookError::MissingField(_))));
    }

    #[tokio::test]
    async fn community_checkout_same_tier_extends_remaining_time() {
        let f = fixture();
        f.store
            .insert_community(
                &community(),
                Subscription {
                    active: true,
                    plan: Plan::Standard,
                    source: SubscriptionSource::Stripe,
                    external_subscription_id: Some("cs_old".to_string()),
                    purchase_date: Some(now().add_days(-20)),
                    expiration_date: Some(now().add_days(10)),
                    ..Subscription::free()
                },
            )
            .await;

        f.reconciler
            .reconcile(&event(community_checkout("cs_new", "price_standard", 1)))
            .await
            .unwrap();

        let record = f.store.community(&community()).await.unwrap();
        assert_eq!(record.expiration_date, Some(now().add_days(10).add_months(1)));
        assert_eq!(record.duration_months, Some(1));
        assert_eq!(record.external_subscription_id.as_deref(), Some("cs_new"));
        assert_eq!(
            f.store.community_created_by(&community()).await,
            Some(UserId::new("payer").unwrap())
        );
    }

    #[tokio::test]
    async fn community_checkout_tier_change_replaces_window() {
        let f = fixture();
        f.store
            .insert_community(
                &community(),
                Subscription {
                    active: true,
                    plan: Plan::Basic,
                    source: SubscriptionSource::Stripe,
                    purchase_date: Some(now().add_days(-20)),
                    expiration_date: Some(now().add_days(10)),
                    ..Subscription::free()
                },
            )
            .await;

        f.reconciler
            .reconcile(&event(community_checkout("cs_new", "price_community_premium", 1)))
            .await
            .unwrap();

        let record = f.store.community(&community()).await.unwrap();
        assert_eq!(record.plan, Plan::Premium);
        assert_eq!(record.expiration_date, Some(now().add_months(1)));
    }

    #[tokio::test]
    async fn community_checkout_without_duration_uses_price_interval() {
        let f = fixture();
        f.store.insert_community(&community(), Subscription::free()).await;
        let mut checkout = community_checkout("cs_year", "price_premium_year", 1);
        if let WebhookEvent::CheckoutCompleted(completed) = &mut checkout {
            completed.correlation.duration_months = None;
        }

        f.reconciler.reconcile(&event(checkout)).await.unwrap();

        let record = f.store.community(&community()).await.unwrap();
        assert_eq!(record.duration_months, Some(12));
        assert_eq!(record.expiration_date, Some(now().add_months(12)));
    }

    #[tokio::test]
    async fn zero_month_community_checkout_clears_stale_expiration() {
        let f = fixture();
        f.store
            .insert_community(
                &community(),
                Subscription {
                    active: true,
                    plan: Plan::Basic,
                    source: SubscriptionSource::Stripe,
                    purchase_date: Some(now().add_days(-20)),
                    expiration_date: Some(now().add_days(10)),
                    ..Subscription::free()
                },
            )
            .await;

        f.reconciler
            .reconcile(&event(community_checkout("cs_zero", "price_standard", 0)))
            .await
            .unwrap();

        let record = f.store.community(&community()).await.unwrap();
        assert_eq!(record.purchase_date, Some(now()));
        assert_eq!(record.expiration_date, None);
    }

    #[tokio::test]
    async fn redelivered_community_checkout_is_not_extended_twice() {
        let f = fixture();
        f.store.insert_community(&community(), Subscription::free()).await;
        let checkout = event(community_checkout("cs_1", "price_standard", 3));

        f.reconciler.reconcile(&checkout).await.unwrap();
        let first = f.store.community(&community()).await.unwrap();
        let outcome = f.reconciler.reconcile(&checkout).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Duplicate);
        assert_eq!(f.store.community(&community()).await.unwrap(), first);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Subscription Updates
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn update_applied_twice_equals_once() {
        let f = fixture();
        f.store.insert_user(&user(), stripe_premium("sub_1")).await;
        let update = event(WebhookEvent::SubscriptionUpdated(changed(
            "sub_1",
            ProviderStatus::Active,
            Some(now().add_days(20)),
        )));

        f.reconciler.reconcile(&update).await.unwrap();
        let once = f.store.user(&user()).await.unwrap();
        f.reconciler.reconcile(&update).await.unwrap();
        let twice = f.store.user(&user()).await.unwrap();

        assert_eq!(once, twice);
        assert!(once.is_pending_cancellation(now()));
    }

    #[tokio::test]
    async fn update_without_cancel_at_reactivates() {
        let f = fixture();
        f.store
            .insert_user(
                &user(),
                Subscription {
                    cancel_at: Some(now().add_days(3)),
                    ..stripe_premium("sub_1")
                },
            )
            .await;

        f.reconciler
            .reconcile(&event(WebhookEvent::SubscriptionUpdated(changed(
                "sub_1",
                ProviderStatus::Active,
                None,
            ))))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert_eq!(record.cancel_at, None);
        assert_eq!(
            PersonalLifecycle::classify(&record, now()),
            PersonalLifecycle::ActivePrimary
        );
    }

    #[tokio::test]
    async fn update_for_unknown_subscription_mutates_nothing() {
        let f = fixture();
        f.store.insert_user(&user(), stripe_premium("sub_1")).await;
        let before = f.store.user(&user()).await.unwrap();

        let outcome = f
            .reconciler
            .reconcile(&event(WebhookEvent::SubscriptionUpdated(changed(
                "sub_unknown",
                ProviderStatus::Active,
                None,
            ))))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::LookupMiss);
        assert_eq!(f.store.user(&user()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn past_due_update_only_touches_cancel_at() {
        let f = fixture();
        f.store.insert_user(&user(), stripe_premium("sub_1")).await;

        f.reconciler
            .reconcile(&event(WebhookEvent::SubscriptionUpdated(SubscriptionChanged {
                price_id: Some("price_base_month".to_string()),
                ..changed("sub_1", ProviderStatus::PastDue, None)
            })))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert_eq!(record.plan, Plan::Premium);
        assert!(record.active);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Cancellation & Entitlement Fallback
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn deletion_with_entitlement_keeps_entitled_plan() {
        let f = fixture();
        f.store.insert_user(&user(), stripe_premium("sub_1")).await;
        f.entitlements
            .grant(Entitlement {
                target_type: PrincipalType::User,
                target_id: "u-1".to_string(),
                plan: Plan::Base,
                active: true,
            })
            .await;

        f.reconciler
            .reconcile(&event(WebhookEvent::SubscriptionDeleted(changed(
                "sub_1",
                ProviderStatus::Canceled,
                None,
            ))))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert_eq!(record.plan, Plan::Base);
        assert!(record.active);
    }

    #[tokio::test]
    async fn deletion_without_entitlement_downgrades_to_free() {
        let f = fixture();
        f.store.insert_user(&user(), stripe_premium("sub_1")).await;

        f.reconciler
            .reconcile(&event(WebhookEvent::SubscriptionDeleted(changed(
                "sub_1",
                ProviderStatus::Canceled,
                None,
            ))))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert_eq!(record.plan, Plan::Free);
        assert!(!record.active);
        assert_eq!(record.source, SubscriptionSource::None);
    }

    #[tokio::test]
    async fn community_deletion_resets_to_free() {
        let f = fixture();
        f.store.insert_community(&community(), stripe_premium("sub_c")).await;

        f.reconciler
            .reconcile(&event(WebhookEvent::SubscriptionDeleted(changed(
                "sub_c",
                ProviderStatus::Canceled,
                None,
            ))))
            .await
            .unwrap();

        let record = f.store.community(&community()).await.unwrap();
        assert_eq!(record.plan, Plan::Free);
        assert!(!record.active);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Invoices
    // ════════════════════════════════════════════════════════════════════════════

    fn invoice(subscription_id: Option<&str>) -> InvoiceEvent {
        InvoiceEvent {
            invoice_id: "in_1".to_string(),
            subscription_id: subscription_id.map(String::from),
            customer_id: Some("cus_1".to_string()),
            price_id: Some("price_premium_month".to_string()),
            period_end: Some(now().add_months(1)),
        }
    }

    #[tokio::test]
    async fn invoice_paid_extends_expiration() {
        let f = fixture();
        f.store.insert_user(&user(), stripe_premium("sub_1")).await;

        f.reconciler
            .reconcile(&event(WebhookEvent::InvoicePaid(invoice(Some("sub_1")))))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert_eq!(record.expiration_date, Some(now().add_months(1)));
        assert!(record.active);
    }

    #[tokio::test]
    async fn one_time_invoice_is_ignored() {
        let f = fixture();
        let outcome = f
            .reconciler
            .reconcile(&event(WebhookEvent::InvoicePaid(invoice(None))))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn invoice_failure_downgrades_immediately_by_default() {
        let f = fixture();
        f.store.insert_user(&user(), stripe_premium("sub_1")).await;

        f.reconciler
            .reconcile(&event(WebhookEvent::InvoiceFailed(invoice(Some("sub_1")))))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert!(!record.active);
        assert_eq!(record.plan, Plan::Free);
    }

    #[tokio::test]
    async fn invoice_failure_with_grace_keeps_access() {
        let f = fixture_with_policy(PaymentFailurePolicy::GracePeriod { days: 7 });
        f.store.insert_user(&user(), stripe_premium("sub_1")).await;

        f.reconciler
            .reconcile(&event(WebhookEvent::InvoiceFailed(invoice(Some("sub_1")))))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert!(record.active);
        assert_eq!(record.plan, Plan::Premium);
        assert_eq!(record.expiration_date, Some(now().add_days(7)));
    }

    #[tokio::test]
    async fn invoice_failure_with_unbounded_grace_saturates() {
        let f = fixture_with_policy(PaymentFailurePolicy::from_grace_days(u32::MAX));
        f.store.insert_user(&user(), stripe_premium("sub_1")).await;

        f.reconciler
            .reconcile(&event(WebhookEvent::InvoiceFailed(invoice(Some("sub_1")))))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert!(record.active);
        assert!(record.expiration_date.unwrap().is_after(&now()));
    }

    #[test]
    fn zero_grace_days_is_immediate_downgrade() {
        assert_eq!(
            PaymentFailurePolicy::from_grace_days(0),
            PaymentFailurePolicy::ImmediateDowngrade
        );
        assert_eq!(
            PaymentFailurePolicy::from_grace_days(3),
            PaymentFailurePolicy::GracePeriod { days: 3 }
        );
    }

    #[tokio::test]
    async fn trial_will_end_is_ignored() {
        let f = fixture();
        let outcome = f
            .reconciler
            .reconcile(&event(WebhookEvent::TrialWillEnd(TrialWillEnd {
                subscription_id: "sub_1".to_string(),
                trial_end: None,
            })))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // App Store
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn app_store_purchase_activates_user() {
        let f = fixture();
        f.store.insert_user(&user(), Subscription::free()).await;

        f.reconciler
            .reconcile(&event(WebhookEvent::AppStoreInitialPurchase(app_purchase(
                "premium_monthly",
            ))))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert_eq!(record.plan, Plan::Premium);
        assert_eq!(record.source, SubscriptionSource::AppStore);
        assert_eq!(record.external_subscription_id.as_deref(), Some("1000000001"));
        assert_eq!(
            PersonalLifecycle::classify(&record, now()),
            PersonalLifecycle::ActiveAppStore
        );
    }

    #[tokio::test]
    async fn app_store_expiration_does_not_touch_stripe_subscription() {
        let f = fixture();
        f.store.insert_user(&user(), stripe_premium("sub_1")).await;
        let before = f.store.user(&user()).await.unwrap();

        let outcome = f
            .reconciler
            .reconcile(&event(WebhookEvent::AppStoreExpiration(app_purchase(
                "premium_monthly",
            ))))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert_eq!(f.store.user(&user()).await.unwrap(), before);
    }

    #[tokio::test]
    async fn app_store_expiration_downgrades_app_store_user() {
        let f = fixture();
        f.store
            .insert_user(
                &user(),
                Subscription {
                    source: SubscriptionSource::AppStore,
                    ..stripe_premium("1000000001")
                },
            )
            .await;

        f.reconciler
            .reconcile(&event(WebhookEvent::AppStoreExpiration(app_purchase(
                "premium_monthly",
            ))))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert!(!record.active);
        assert_eq!(record.source, SubscriptionSource::None);
    }

    #[tokio::test]
    async fn app_store_cancellation_with_future_expiration_is_pending() {
        let f = fixture();
        f.store
            .insert_user(
                &user(),
                Subscription {
                    source: SubscriptionSource::AppStore,
                    ..stripe_premium("1000000001")
                },
            )
            .await;

        f.reconciler
            .reconcile(&event(WebhookEvent::AppStoreCancellation(app_purchase(
                "premium_monthly",
            ))))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert_eq!(
            PersonalLifecycle::classify(&record, now()),
            PersonalLifecycle::PendingCancellationAppStore
        );
    }

    #[tokio::test]
    async fn app_store_uncancellation_clears_pending() {
        let f = fixture();
        f.store
            .insert_user(
                &user(),
                Subscription {
                    source: SubscriptionSource::AppStore,
                    cancel_at: Some(now().add_days(10)),
                    ..stripe_premium("1000000001")
                },
            )
            .await;

        f.reconciler
            .reconcile(&event(WebhookEvent::AppStoreUncancellation(app_purchase(
                "premium_monthly",
            ))))
            .await
            .unwrap();

        assert_eq!(f.store.user(&user()).await.unwrap().cancel_at, None);
    }

    #[tokio::test]
    async fn app_store_product_change_updates_plan() {
        let f = fixture();
        f.store
            .insert_user(
                &user(),
                Subscription {
                    source: SubscriptionSource::AppStore,
                    ..stripe_premium("1000000001")
                },
            )
            .await;

        f.reconciler
            .reconcile(&event(WebhookEvent::AppStoreProductChange(AppStoreProductChange {
                purchase: app_purchase("premium_monthly"),
                new_product_id: "premium_plus_yearly".to_string(),
            })))
            .await
            .unwrap();

        let record = f.store.user(&user()).await.unwrap();
        assert_eq!(record.plan, Plan::PremiumPlus);
        assert!(record.is_annual);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Store Failures
    // ════════════════════════════════════════════════════════════════════════════

    struct FailingStore;

    #[async_trait]
    impl SubscriptionStore for FailingStore {
        async fn find_by_principal(
            &self,
            _principal: &PrincipalRef,
        ) -> Result<Option<Subscription>, DomainError> {
            Err(DomainError::database("connection refused"))
        }

        async fn find_by_external_subscription_id(
            &self,
            _id: &str,
        ) -> Result<Option<LocatedSubscription>, DomainError> {
            Err(DomainError::database("connection refused"))
        }

        async fn apply_patch(
            &self,
            _principal: &PrincipalRef,
            _patch: &SubscriptionPatch,
        ) -> Result<bool, DomainError> {
            Err(DomainError::database("connection refused"))
        }
    }

    #[tokio::test]
    async fn store_failure_is_retryable_error() {
        let reconciler = SubscriptionReconciler::new(
            Arc::new(FailingStore),
            Arc::new(PriceCatalog::default()),
            EntitlementFallback::new(Arc::new(InMemoryEntitlementReader::new())),
        );

        let result = reconciler
            .reconcile(&event(WebhookEvent::SubscriptionDeleted(changed(
                "sub_1",
                ProviderStatus::Canceled,
                None,
            ))))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, WebhookError::Store(_)));
        assert!(err.is_retryable());
    }

}
