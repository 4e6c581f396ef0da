//! Which payment provider owns a principal's subscription.

use serde::{Deserialize, Serialize};

/// Subscription source.
///
/// Set only by a successful event from that provider; inactive
/// subscriptions always carry `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionSource {
    /// Primary checkout/billing provider (Stripe).
    Stripe,
    /// Mobile in-app-purchase provider.
    AppStore,
    #[default]
    None,
}

impl SubscriptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionSource::Stripe => "stripe",
            SubscriptionSource::AppStore => "app_store",
            SubscriptionSource::None => "none",
        }
    }

    /// Parses the storage name; anything unrecognized maps to `None`.
    pub fn parse(s: &str) -> Self {
        match s {
            "stripe" => SubscriptionSource::Stripe,
            "app_store" => SubscriptionSource::AppStore,
            _ => SubscriptionSource::None,
        }
    }
}

impl std::fmt::Display for SubscriptionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
