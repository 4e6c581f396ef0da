//! Process-start configuration for `subscription-sync`.
//!
//! An optional YAML/TOML file is read first. `SUBSCRIPTION_SYNC__<SECTION>__<KEY>`
//! variables override it, with `.env` loaded into the environment beforehand.
//! Nothing here is reloaded after startup.
//!
//! ```no_run
//! use subscription_sync::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! config.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod database;
mod error;
mod payment;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;
use std::path::Path;

const ENV_PREFIX: &str = "SUBSCRIPTION_SYNC";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Listener, log filter and webhook deadline. Every key has a default.
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    /// Provider secrets, price catalog and session URLs.
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Reads `.env` and the prefixed environment.
    ///
    /// `SUBSCRIPTION_SYNC__SERVER__PORT=8080` becomes `server.port`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Like [`AppConfig::load`], with a config file underneath the
    /// environment. Environment variables win over file values.
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Runs every section's checks; the first failure wins.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const MINIMAL_ENV: &[(&str, &str)] = &[
        ("SUBSCRIPTION_SYNC__DATABASE__URL", "postgresql://test@localhost/test"),
        ("SUBSCRIPTION_SYNC__PAYMENT__STRIPE_API_KEY", "sk_test_xxx"),
        ("SUBSCRIPTION_SYNC__PAYMENT__STRIPE_WEBHOOK_SECRET", "whsec_xxx"),
        ("SUBSCRIPTION_SYNC__PAYMENT__APP_STORE_WEBHOOK_SECRET", "app_store_xxx"),
        ("SUBSCRIPTION_SYNC__PAYMENT__PRICE_CATALOG_PATH", "config/prices.yaml"),
        ("SUBSCRIPTION_SYNC__PAYMENT__CHECKOUT_SUCCESS_URL", "https://app.example.com/ok"),
        ("SUBSCRIPTION_SYNC__PAYMENT__CHECKOUT_CANCEL_URL", "https://app.example.com/cancel"),
        ("SUBSCRIPTION_SYNC__PAYMENT__PORTAL_RETURN_URL", "https://app.example.com/settings"),
    ];

    const OPTIONAL_ENV: &[&str] = &[
        "SUBSCRIPTION_SYNC__SERVER__PORT",
        "SUBSCRIPTION_SYNC__SERVER__ENVIRONMENT",
        "SUBSCRIPTION_SYNC__PAYMENT__PAYMENT_FAILURE_GRACE_DAYS",
    ];

    fn set_minimal_env() {
        for (key, value) in MINIMAL_ENV {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in MINIMAL_ENV {
            env::remove_var(key);
        }
        for key in OPTIONAL_ENV {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_minimal_environment_loads_and_validates() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert_eq!(config.payment.stripe_api_base_url, "https://api.stripe.com");
        assert_eq!(config.payment.signature_tolerance_secs, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_section_is_optional() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert!(!config.is_production());
    }

    #[test]
    fn test_environment_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SUBSCRIPTION_SYNC__SERVER__PORT", "3000");
        env::set_var("SUBSCRIPTION_SYNC__SERVER__ENVIRONMENT", "production");
        env::set_var("SUBSCRIPTION_SYNC__PAYMENT__PAYMENT_FAILURE_GRACE_DAYS", "7");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(config.payment.payment_failure_grace_days, 7);
    }

    #[test]
    fn test_file_values_are_loaded_under_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "server:\n  port: 9090\n  request_timeout_secs: 12\npayment:\n  signature_tolerance_secs: 300\n"
        )
        .unwrap();

        set_minimal_env();
        let result = AppConfig::load_from(Some(file.path()));
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.request_timeout_secs, 12);
        assert_eq!(config.payment.signature_tolerance_secs, Some(300));
    }

    #[test]
    fn test_missing_payment_section_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("SUBSCRIPTION_SYNC__DATABASE__URL", "postgresql://test@localhost/test");
        let result = AppConfig::load();
        clear_env();

        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
