//! Personal subscription lifecycle.
//!
//! A user's record is always in one of five states, derived from the
//! stored fields rather than persisted separately. Free is both the
//! initial state and a valid restart point, so nothing is terminal.

use serde::{Deserialize, Serialize};

use super::source::SubscriptionSource;
use super::subscription::Subscription;
use crate::domain::foundation::{StateMachine, Timestamp};

/// State of a personal (user-owned) subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalLifecycle {
    /// No paid subscription, or an entitlement without a provider.
    Free,
    /// Active through the checkout/billing provider.
    ActivePrimary,
    /// Active through the mobile in-app-purchase provider.
    ActiveAppStore,
    /// Primary subscription with a scheduled cancellation.
    PendingCancellationPrimary,
    /// App store subscription with auto-renew turned off.
    PendingCancellationAppStore,
}

impl PersonalLifecycle {
    /// Derives the lifecycle state from a stored record.
    ///
    /// Records that are active without a provider source (entitlement
    /// grants) classify as `Free`: no provider owns them.
    pub fn classify(record: &Subscription, now: Timestamp) -> Self {
        if !record.active {
            return PersonalLifecycle::Free;
        }
        let pending = record.is_pending_cancellation(now);
        match (record.source, pending) {
            (SubscriptionSource::Stripe, false) => PersonalLifecycle::ActivePrimary,
            (SubscriptionSource::Stripe, true) => PersonalLifecycle::PendingCancellationPrimary,
            (SubscriptionSource::AppStore, false) => PersonalLifecycle::ActiveAppStore,
            (SubscriptionSource::AppStore, true) => PersonalLifecycle::PendingCancellationAppStore,
            (SubscriptionSource::None, _) => PersonalLifecycle::Free,
        }
    }

    /// Returns true if a provider currently claims this record.
    pub fn is_provider_owned(&self) -> bool {
        !matches!(self, PersonalLifecycle::Free)
    }

    /// Provider that owns the record in this state, if any.
    pub fn owner(&self) -> SubscriptionSource {
        match self {
            PersonalLifecycle::Free => SubscriptionSource::None,
            PersonalLifecycle::ActivePrimary | PersonalLifecycle::PendingCancellationPrimary => {
                SubscriptionSource::Stripe
            }
            PersonalLifecycle::ActiveAppStore | PersonalLifecycle::PendingCancellationAppStore => {
                SubscriptionSource::AppStore
            }
        }
    }
}

impl StateMachine for PersonalLifecycle {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PersonalLifecycle::*;
        matches!(
            (self, target),
            // From FREE
            (Free, ActivePrimary)
                | (Free, ActiveAppStore)
                | (Free, Free)
            // From ACTIVE_PRIMARY
                | (ActivePrimary, ActivePrimary) // Renewal / plan change
                | (ActivePrimary, PendingCancellationPrimary)
                | (ActivePrimary, Free)
            // From ACTIVE_APP_STORE
                | (ActiveAppStore, ActiveAppStore)
                | (ActiveAppStore, PendingCancellationAppStore)
                | (ActiveAppStore, Free)
            // From PENDING_CANCELLATION
                | (PendingCancellationPrimary, ActivePrimary) // Reactivation
                | (PendingCancellationPrimary, PendingCancellationPrimary)
                | (PendingCancellationPrimary, Free)
                | (PendingCancellationAppStore, ActiveAppStore)
                | (PendingCancellationAppStore, PendingCancellationAppStore)
                | (PendingCancellationAppStore, Free)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PersonalLifecycle::*;
        match self {
            Free => vec![ActivePrimary, ActiveAppStore, Free],
            ActivePrimary => vec![ActivePrimary, PendingCancellationPrimary, Free],
            ActiveAppStore => vec![ActiveAppStore, PendingCancellationAppStore, Free],
            PendingCancellationPrimary => vec![ActivePrimary, PendingCancellationPrimary, Free],
            PendingCancellationAppStore => {
                vec![ActiveAppStore, PendingCancellationAppStore, Free]
            }
        }
    }
}
