//! Payment provider configuration
//!
//! Secrets are held as `SecretString` and never appear in `Debug` output.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

/// Upper bound for `payment_failure_grace_days`.
pub const MAX_GRACE_DAYS: u32 = 90;

/// Payment configuration (Stripe, app store, price catalog, session URLs)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key (`sk_...`)
    pub stripe_api_key: SecretString,

    /// Stripe webhook signing secret (`whsec_...`)
    pub stripe_webhook_secret: SecretString,

    /// Shared secret for app store webhook signatures
    pub app_store_webhook_secret: SecretString,

    #[serde(default = "default_stripe_api_base_url")]
    pub stripe_api_base_url: String,

    /// Ignore Stripe events whose `livemode` is false
    #[serde(default)]
    pub stripe_require_livemode: bool,

    /// Replay window for signed timestamps. Absent disables the freshness check.
    #[serde(default)]
    pub signature_tolerance_secs: Option<i64>,

    /// Days a failed renewal keeps access. Zero downgrades immediately.
    #[serde(default)]
    pub payment_failure_grace_days: u32,

    /// YAML file of price/product entries
    pub price_catalog_path: PathBuf,

    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub portal_return_url: String,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let api_key = self.stripe_api_key.expose_secret();
        let webhook_secret = self.stripe_webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "PAYMENT__STRIPE_WEBHOOK_SECRET",
            ));
        }
        if self.app_store_webhook_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired(
                "PAYMENT__APP_STORE_WEBHOOK_SECRET",
            ));
        }

        // Verify key prefixes for safety
        if !api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if matches!(self.signature_tolerance_secs, Some(secs) if secs <= 0) {
            return Err(ValidationError::InvalidSignatureTolerance);
        }
        if self.payment_failure_grace_days > MAX_GRACE_DAYS {
            return Err(ValidationError::GracePeriodTooLong(MAX_GRACE_DAYS));
        }
        if self.price_catalog_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__PRICE_CATALOG_PATH"));
        }

        check_url("stripe_api_base_url", &self.stripe_api_base_url)?;
        check_url("checkout_success_url", &self.checkout_success_url)?;
        check_url("checkout_cancel_url", &self.checkout_cancel_url)?;
        check_url("portal_return_url", &self.portal_return_url)?;
        Ok(())
    }
}

fn check_url(name: &'static str, url: &str) -> Result<(), ValidationError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrl(name))
    }
}

fn default_stripe_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}
