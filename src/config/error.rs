//! Startup configuration failures.

use thiserror::Error;

use super::database::MAX_POOL_SIZE;
use super::server::MAX_WEBHOOK_DEADLINE_SECS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration sources: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("configuration rejected: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// A loaded value that the service refuses to start with.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0} must be set")]
    MissingRequired(&'static str),

    #[error("server port must be non-zero")]
    InvalidPort,

    #[error("'{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("webhook deadline must be between 1 and {} seconds", MAX_WEBHOOK_DEADLINE_SECS)]
    InvalidTimeout,

    #[error("database url must use the postgres:// or postgresql:// scheme")]
    InvalidDatabaseUrl,

    #[error("pool needs max_connections >= min_connections and at least 1")]
    InvalidPoolSize,

    #[error("pool may hold at most {} connections", MAX_POOL_SIZE)]
    PoolSizeTooLarge,

    #[error("stripe api key must start with sk_")]
    InvalidStripeKey,

    #[error("stripe webhook secret must start with whsec_")]
    InvalidStripeWebhookSecret,

    #[error("signature tolerance must be positive")]
    InvalidSignatureTolerance,

    #[error("payment failure grace period may be at most {0} days")]
    GracePeriodTooLong(u32),

    #[error("{0} must be an absolute http(s) url")]
    InvalidUrl(&'static str),
}
