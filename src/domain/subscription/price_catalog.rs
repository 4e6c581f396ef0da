//! Static price/product catalog.
//!
//! Maps opaque provider price and product ids to `(plan, interval)`. Built
//! once at startup from YAML and injected wherever ids are resolved.
//!
//! ```yaml
//! prices:
//!   - id: price_1Pbase_month
//!     plan: base
//!     interval: month
//!   - id: premium_yearly
//!     plan: premium
//!     interval: year
//!     provider: app_store
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use super::plan::{BillingInterval, Plan};
use super::source::SubscriptionSource;

/// Errors building a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read price catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse price catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Price catalog entry has an empty id")]
    EmptyId,

    #[error("Duplicate price id in catalog: {0}")]
    DuplicateId(String),

    #[error("Price '{0}' maps to a plan that cannot be purchased")]
    UnpurchasablePlan(String),
}

/// One catalog line as written in the YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub plan: Plan,
    pub interval: BillingInterval,
    #[serde(default = "default_provider")]
    pub provider: SubscriptionSource,
}

fn default_provider() -> SubscriptionSource {
    SubscriptionSource::Stripe
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    prices: Vec<CatalogEntry>,
}

/// Outcome of resolving a price id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPrice {
    /// `Plan::Unknown` when the id is not in the catalog.
    pub plan: Plan,
    pub interval: Option<BillingInterval>,
}

impl ResolvedPrice {
    pub fn unknown() -> Self {
        Self {
            plan: Plan::Unknown,
            interval: None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.plan.is_known()
    }

    pub fn is_annual(&self) -> bool {
        self.interval.map(|i| i.is_annual()).unwrap_or(false)
    }
}

/// Price/product resolver.
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    by_id: HashMap<String, CatalogEntry>,
}

impl PriceCatalog {
    /// Builds a catalog, rejecting empty or duplicate ids.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(entries.len());
        for entry in entries {
            let id = entry.id.trim().to_string();
            if id.is_empty() {
                return Err(CatalogError::EmptyId);
            }
            if !entry.plan.is_paid() {
                return Err(CatalogError::UnpurchasablePlan(id));
            }
            if by_id.contains_key(&id) {
                return Err(CatalogError::DuplicateId(id));
            }
            by_id.insert(id.clone(), CatalogEntry { id, ..entry });
        }
        Ok(Self { by_id })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::new(file.prices)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Resolves a provider price/product id.
    ///
    /// Unknown ids yield `Plan::Unknown`; callers must keep the stored plan.
    pub fn resolve(&self, price_id: &str) -> ResolvedPrice {
        match self.by_id.get(price_id.trim()) {
            Some(entry) => ResolvedPrice {
                plan: entry.plan,
                interval: Some(entry.interval),
            },
            None => {
                tracing::warn!(price_id = %price_id, "Price id not in catalog; keeping existing plan");
                ResolvedPrice::unknown()
            }
        }
    }

    /// Reverse lookup used when creating checkout sessions.
    pub fn price_for(
        &self,
        provider: SubscriptionSource,
        plan: Plan,
        interval: BillingInterval,
    ) -> Option<&str> {
        let mut matches: Vec<&CatalogEntry> = self
            .by_id
            .values()
            .filter(|e| e.provider == provider && e.plan == plan && e.interval == interval)
            .collect();
        // HashMap order is unstable; pick deterministically.
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.first().map(|e| e.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
