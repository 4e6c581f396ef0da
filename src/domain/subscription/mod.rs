//! Subscription domain.
//!
//! Canonical subscription record, the two providers' events decoded into
//! one vocabulary, and the pure rules (price resolution, promotion
//! arithmetic, signature verification) the reconciler builds on.

mod events;
mod lifecycle;
mod plan;
mod price_catalog;
mod principal;
mod promotion;
mod source;
mod subscription;
mod webhook_errors;
mod webhook_verifier;

pub use events::{
    AppStoreProductChange, AppStorePurchase, CheckoutCompleted, CheckoutMode, DecodedEvent,
    InvoiceEvent, ProviderEvent, ProviderStatus, PurchasedPrice, SubscriptionChanged,
    TrialWillEnd, WebhookEvent,
};
pub use lifecycle::PersonalLifecycle;
pub use plan::{BillingInterval, Plan};
pub use price_catalog::{CatalogEntry, CatalogError, PriceCatalog, ResolvedPrice};
pub use principal::{
    metadata_keys, CheckoutCorrelation, CorrelationError, PrincipalRef, PrincipalType,
};
pub use promotion::{extend_promotion, ExtensionKind, PromotionExtension, PromotionPurchase};
pub use source::SubscriptionSource;
pub use subscription::{Subscription, SubscriptionPatch};
pub use webhook_errors::{WebhookError, WebhookOutcome};
pub use webhook_verifier::{sign_payload, SignatureHeader, WebhookVerifier};
