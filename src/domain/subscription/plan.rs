//! Subscription plan definitions.
//!
//! Personal plans (`base`, `premium`, `premium_plus`) are ongoing
//! subscriptions. Community plans (`basic`, `standard`, `premium`, `elite`)
//! are time-boxed promotions. `premium` is shared by both vocabularies.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Semantic subscription level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// No paid subscription.
    Free,
    Base,
    Premium,
    PremiumPlus,
    /// Community promotion tiers.
    Basic,
    Standard,
    Elite,
    /// Sentinel for a price/product id missing from the catalog.
    ///
    /// Never written to a record: callers keep the existing plan instead.
    Unknown,
}

impl Plan {
    /// Returns true if this plan is a paid level.
    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free | Plan::Unknown)
    }

    /// Returns true if the catalog recognized the id this plan came from.
    pub fn is_known(&self) -> bool {
        !matches!(self, Plan::Unknown)
    }

    /// Stable wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Base => "base",
            Plan::Premium => "premium",
            Plan::PremiumPlus => "premium_plus",
            Plan::Basic => "basic",
            Plan::Standard => "standard",
            Plan::Elite => "elite",
            Plan::Unknown => "unknown",
        }
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    /// Parses a plan name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "base" => Ok(Plan::Base),
            "premium" => Ok(Plan::Premium),
            "premium_plus" | "premiumplus" | "premium-plus" => Ok(Plan::PremiumPlus),
            "basic" => Ok(Plan::Basic),
            "standard" => Ok(Plan::Standard),
            "elite" => Ok(Plan::Elite),
            "unknown" => Ok(Plan::Unknown),
            other => Err(ValidationError::invalid_format(
                "plan",
                format!("unrecognized plan '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billing cadence of a catalog price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    pub fn is_annual(&self) -> bool {
        matches!(self, BillingInterval::Year)
    }

    /// Default promotion length for a purchase at this cadence.
    pub fn months(&self) -> u32 {
        match self {
            BillingInterval::Month => 1,
            BillingInterval::Year => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }
}

impl FromStr for BillingInterval {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" | "monthly" => Ok(BillingInterval::Month),
            "year" | "yearly" | "annual" => Ok(BillingInterval::Year),
            other => Err(ValidationError::invalid_format(
                "billing_interval",
                format!("unrecognized interval '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
