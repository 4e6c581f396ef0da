//! Expiration arithmetic for time-boxed community promotions.
//!
//! Repurchasing the same tier while it is still running stacks the new
//! months on top of the remaining time. Any other purchase starts a fresh
//! window and discards what was left of the previous tier.

use super::plan::Plan;
use super::subscription::Subscription;
use crate::domain::foundation::Timestamp;

/// Incoming community purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionPurchase {
    pub tier: Plan,
    pub duration_months: u32,
    /// Expiration chosen at checkout, honored only for fresh windows.
    pub metadata_expiration: Option<Timestamp>,
}

/// How the new expiration was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    /// Same tier, still running: months added to the remaining time.
    Extended,
    /// New window; any remaining time was discarded.
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionExtension {
    pub expiration: Timestamp,
    pub kind: ExtensionKind,
}

/// Computes the expiration a community promotion should carry after `purchase`.
pub fn extend_promotion(
    current: &Subscription,
    purchase: &PromotionPurchase,
    now: Timestamp,
) -> PromotionExtension {
    let running_expiration = current
        .expiration_date
        .filter(|exp| current.active && current.plan == purchase.tier && exp.is_after(&now));

    match running_expiration {
        Some(expiration) => PromotionExtension {
            expiration: now.max(expiration).add_months(purchase.duration_months),
            kind: ExtensionKind::Extended,
        },
        None => PromotionExtension {
            expiration: purchase
                .metadata_expiration
                .unwrap_or_else(|| now.add_months(purchase.duration_months)),
            kind: ExtensionKind::Replaced,
        },
    }
}
