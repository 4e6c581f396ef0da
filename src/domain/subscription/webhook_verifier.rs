//! Webhook signature verification.
//!
//! Both providers sign deliveries the same way: HMAC-SHA256 over
//! `"<timestamp>.<raw body>"`, sent as `t=<unix secs>,v1=<hex>[,v0=<hex>]`.
//!
//! No freshness check is applied unless a tolerance is configured, so a
//! captured delivery can be replayed indefinitely by default.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::webhook_errors::WebhookError;
use crate::domain::foundation::Timestamp;

/// Maximum allowed clock skew for future events when a tolerance is set.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components of a signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parses `t=<timestamp>,v1=<signature>[,v0=<legacy>]`.
    ///
    /// The header must have exactly two or three segments. `v0` is
    /// accepted and ignored.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let parts: Vec<&str> = header.split(',').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(WebhookError::MalformedSignatureHeader(format!(
                "expected 2 or 3 segments, found {}",
                parts.len()
            )));
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<Vec<u8>> = None;

        for part in parts {
            let (key, value) = part.trim().split_once('=').ok_or_else(|| {
                WebhookError::MalformedSignatureHeader("segment without '='".to_string())
            })?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::MalformedSignatureHeader("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signature = Some(hex::decode(value).map_err(|_| {
                        WebhookError::MalformedSignatureHeader(
                            "invalid v1 signature hex".to_string(),
                        )
                    })?);
                }
                "v0" => {}
                other => {
                    return Err(WebhookError::MalformedSignatureHeader(format!(
                        "unexpected segment '{}'",
                        other
                    )))
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            WebhookError::MalformedSignatureHeader("missing timestamp".to_string())
        })?;
        let v1_signature = v1_signature.ok_or_else(|| {
            WebhookError::MalformedSignatureHeader("missing v1 signature".to_string())
        })?;

        Ok(SignatureHeader {
            timestamp,
            v1_signature,
        })
    }
}

/// Verifier for one provider's shared signing secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
    /// Replay window in seconds. `None` disables the freshness check.
    tolerance_secs: Option<i64>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance_secs: None,
        }
    }

    /// Enables a replay window.
    pub fn with_tolerance(mut self, tolerance_secs: Option<i64>) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Authenticates a raw body against its signature header.
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<(), WebhookError> {
        self.verify_at(payload, signature_header, Timestamp::now())
    }

    /// Same as [`verify`](Self::verify) with an explicit clock.
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: Timestamp,
    ) -> Result<(), WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        if let Some(tolerance) = self.tolerance_secs {
            validate_timestamp(header.timestamp, now.as_unix_secs(), tolerance)?;
        }

        let expected = self.compute_signature(header.timestamp, payload)?;
        if !constant_time_compare(&expected, &header.v1_signature) {
            return Err(WebhookError::InvalidSignature);
        }

        Ok(())
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn validate_timestamp(timestamp: i64, now: i64, tolerance: i64) -> Result<(), WebhookError> {
    let age = now
        .checked_sub(timestamp)
        .ok_or(WebhookError::InvalidTimestamp)?;

    if age > tolerance {
        return Err(WebhookError::TimestampOutOfRange);
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(WebhookError::InvalidTimestamp);
    }

    Ok(())
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Produces a `t=..,v1=..` header for `payload`.
///
/// Used by fixtures and by local tooling that replays captured events.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return format!("t={},v1=", timestamp),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}
