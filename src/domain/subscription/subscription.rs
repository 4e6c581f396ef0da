//! Canonical subscription record and the field-filtered patch that mutates it.
//!
//! Every webhook effect is expressed as one [`SubscriptionPatch`]: a set of
//! absolute field values, never increments. Reapplying a patch yields the
//! same record, which is what makes redelivery safe.

use serde::{Deserialize, Serialize};

use super::plan::Plan;
use super::source::SubscriptionSource;
use crate::domain::foundation::{Timestamp, UserId};

/// Subscription sub-record owned by exactly one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub active: bool,
    pub plan: Plan,
    /// Personal subscriptions: billed yearly.
    pub is_annual: bool,
    /// Community promotions: length of the purchased window.
    pub duration_months: Option<u32>,
    pub source: SubscriptionSource,
    pub external_subscription_id: Option<String>,
    pub external_customer_id: Option<String>,
    pub purchase_date: Option<Timestamp>,
    pub expiration_date: Option<Timestamp>,
    pub cancel_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl Default for Subscription {
    fn default() -> Self {
        Self::free()
    }
}

impl Subscription {
    /// The implicit state of a principal that never paid.
    pub fn free() -> Self {
        Self {
            active: false,
            plan: Plan::Free,
            is_annual: false,
            duration_months: None,
            source: SubscriptionSource::None,
            external_subscription_id: None,
            external_customer_id: None,
            purchase_date: None,
            expiration_date: None,
            cancel_at: None,
            updated_at: None,
        }
    }

    /// True while the record grants a paid plan that has not run out.
    pub fn is_current(&self, now: Timestamp) -> bool {
        self.active
            && self
                .expiration_date
                .map(|exp| exp.is_after(&now))
                .unwrap_or(true)
    }

    /// True when a cancellation is scheduled in the future.
    pub fn is_pending_cancellation(&self, now: Timestamp) -> bool {
        self.active && self.cancel_at.map(|at| at.is_after(&now)).unwrap_or(false)
    }
}

/// Absolute-value update restricted to the subscription fields.
///
/// `None` leaves a field untouched; `Some(None)` on an optional field clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPatch {
    pub active: Option<bool>,
    pub plan: Option<Plan>,
    pub is_annual: Option<bool>,
    pub duration_months: Option<Option<u32>>,
    pub source: Option<SubscriptionSource>,
    pub external_subscription_id: Option<Option<String>>,
    pub external_customer_id: Option<String>,
    pub purchase_date: Option<Timestamp>,
    pub expiration_date: Option<Option<Timestamp>>,
    pub cancel_at: Option<Option<Timestamp>>,
    /// Community records only: who paid for the promotion.
    pub created_by: Option<UserId>,
    pub updated_at: Timestamp,
}

impl SubscriptionPatch {
    /// An empty patch stamped with the event time.
    pub fn at(updated_at: Timestamp) -> Self {
        Self {
            active: None,
            plan: None,
            is_annual: None,
            duration_months: None,
            source: None,
            external_subscription_id: None,
            external_customer_id: None,
            purchase_date: None,
            expiration_date: None,
            cancel_at: None,
            created_by: None,
            updated_at,
        }
    }

    /// Collapse to `{plan: free, active: false, source: none}`.
    pub fn downgrade_to_free(updated_at: Timestamp) -> Self {
        Self::at(updated_at)
            .active(false)
            .plan(Plan::Free)
            .source(SubscriptionSource::None)
            .cancel_at(None)
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Sets the plan unless the catalog did not recognize it.
    ///
    /// `Plan::Unknown` keeps whatever plan the record already has, so an
    /// incomplete catalog can never corrupt stored state.
    pub fn plan(mut self, plan: Plan) -> Self {
        if plan.is_known() {
            self.plan = Some(plan);
        }
        self
    }

    pub fn is_annual(mut self, is_annual: bool) -> Self {
        self.is_annual = Some(is_annual);
        self
    }

    pub fn duration_months(mut self, months: Option<u32>) -> Self {
        self.duration_months = Some(months);
        self
    }

    pub fn source(mut self, source: SubscriptionSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn external_subscription_id(mut self, id: Option<String>) -> Self {
        self.external_subscription_id = Some(id);
        self
    }

    /// Only overwrites when a customer id is actually known.
    pub fn external_customer_id(mut self, id: Option<String>) -> Self {
        if id.is_some() {
            self.external_customer_id = id;
        }
        self
    }

    pub fn purchase_date(mut self, at: Timestamp) -> Self {
        self.purchase_date = Some(at);
        self
    }

    pub fn expiration_date(mut self, at: Option<Timestamp>) -> Self {
        self.expiration_date = Some(at);
        self
    }

    pub fn cancel_at(mut self, at: Option<Timestamp>) -> Self {
        self.cancel_at = Some(at);
        self
    }

    pub fn created_by(mut self, user: Option<UserId>) -> Self {
        self.created_by = user;
        self
    }

    /// Enforces record invariants against the currently stored record.
    ///
    /// - An inactive result always carries `source = none`.
    /// - An expiration not after the effective purchase date is dropped.
    ///   When the patch moves the purchase date, the stored expiration is
    ///   cleared as well so the pair never ends up out of order.
    pub fn normalized(mut self, current: &Subscription) -> Self {
        let will_be_active = self.active.unwrap_or(current.active);
        if !will_be_active {
            self.source = Some(SubscriptionSource::None);
        }

        if self.expiration_date.is_none() && self.purchase_date.is_none() {
            return self;
        }

        let expiration = self.expiration_date.unwrap_or(current.expiration_date);
        let purchase = self.purchase_date.or(current.purchase_date);
        if let (Some(expiration), Some(purchase)) = (expiration, purchase) {
            if !expiration.is_after(&purchase) {
                tracing::warn!(
                    expiration = %expiration.as_datetime(),
                    purchase = %purchase.as_datetime(),
                    "Dropping expiration that does not follow the purchase date"
                );
                self.expiration_date = match self.purchase_date {
                    Some(_) => Some(None),
                    None => None,
                };
            }
        }

        self
    }

    /// Applies the patch to an in-memory record.
    pub fn apply_to(&self, record: &mut Subscription) {
        if let Some(active) = self.active {
            record.active = active;
        }
        if let Some(plan) = self.plan {
            record.plan = plan;
        }
        if let Some(is_annual) = self.is_annual {
            record.is_annual = is_annual;
        }
        if let Some(months) = self.duration_months {
            record.duration_months = months;
        }
        if let Some(source) = self.source {
            record.source = source;
        }
        if let Some(id) = &self.external_subscription_id {
            record.external_subscription_id = id.clone();
        }
        if let Some(id) = &self.external_customer_id {
            record.external_customer_id = Some(id.clone());
        }
        if let Some(at) = self.purchase_date {
            record.purchase_date = Some(at);
        }
        if let Some(at) = self.expiration_date {
            record.expiration_date = at;
        }
        if let Some(at) = self.cancel_at {
            record.cancel_at = at;
        }
        record.updated_at = Some(self.updated_at);
    }

    /// Names of the fields this patch writes, for logging.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.active.is_some() {
            fields.push("active");
        }
        if self.plan.is_some() {
            fields.push("plan");
        }
        if self.is_annual.is_some() {
            fields.push("isAnnual");
        }
        if self.duration_months.is_some() {
            fields.push("durationMonths");
        }
        if self.source.is_some() {
            fields.push("source");
        }
        if self.external_subscription_id.is_some() {
            fields.push("externalSubscriptionId");
        }
        if self.external_customer_id.is_some() {
            fields.push("externalCustomerId");
        }
        if self.purchase_date.is_some() {
            fields.push("purchaseDate");
        }
        if self.expiration_date.is_some() {
            fields.push("expirationDate");
        }
        if self.cancel_at.is_some() {
            fields.push("cancelAt");
        }
        if self.created_by.is_some() {
            fields.push("subscriptionCreatedBy");
        }
        fields.push("updatedAt");
        fields
    }
}
