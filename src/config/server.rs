//! HTTP listener settings and the per-delivery webhook deadline.

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use super::error::ValidationError;

const DEFAULT_BIND_HOST: &str = "0.0.0.0";
const DEFAULT_BIND_PORT: u16 = 8080;
const DEFAULT_WEBHOOK_DEADLINE_SECS: u64 = 30;

/// Longest deadline a webhook delivery may be given.
///
/// Providers give up on a delivery well before this and schedule a retry.
pub const MAX_WEBHOOK_DEADLINE_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "bind_host")]
    pub host: String,

    #[serde(default = "bind_port")]
    pub port: u16,

    /// `production` switches logs to JSON.
    #[serde(default)]
    pub environment: Environment,

    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    #[serde(default = "log_filter")]
    pub log_level: String,

    /// Deadline for one webhook delivery, in seconds.
    #[serde(default = "webhook_deadline_secs")]
    pub request_timeout_secs: u64,

    /// Comma-separated browser origins allowed to call the session endpoints.
    pub cors_origins: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ValidationError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse()
            .map_err(|_| ValidationError::InvalidBindAddress(raw))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Trimmed origins; blank entries from stray commas are dropped.
    pub fn cors_origins_list(&self) -> Vec<String> {
        let Some(raw) = self.cors_origins.as_deref() else {
            return Vec::new();
        };
        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if !(1..=MAX_WEBHOOK_DEADLINE_SECS).contains(&self.request_timeout_secs) {
            return Err(ValidationError::InvalidTimeout);
        }
        self.socket_addr().map(|_| ())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: bind_host(),
            port: bind_port(),
            environment: Environment::default(),
            log_level: log_filter(),
            request_timeout_secs: webhook_deadline_secs(),
            cors_origins: None,
        }
    }
}

fn bind_host() -> String {
    DEFAULT_BIND_HOST.to_string()
}

fn bind_port() -> u16 {
    DEFAULT_BIND_PORT
}

fn log_filter() -> String {
    "info,subscription_sync=debug,sqlx=warn".to_string()
}

fn webhook_deadline_secs() -> u64 {
    DEFAULT_WEBHOOK_DEADLINE_SECS
}
