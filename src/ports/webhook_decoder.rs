//! Webhook decoder port.
//!
//! Each provider's JSON vocabulary is decoded into the canonical event
//! union by its own adapter. Decoding runs only on authenticated bodies.

use crate::domain::subscription::{DecodedEvent, WebhookError};

pub trait WebhookDecoder: Send + Sync {
    /// Short provider name for logs.
    fn provider(&self) -> &'static str;

    /// Decodes one raw delivery.
    ///
    /// # Errors
    ///
    /// - `MalformedPayload` if the body is not a provider event envelope
    /// - `MissingField` / `InvalidField` if a recognized event lacks data
    ///
    /// Unknown event types are `Ok(DecodedEvent::Unrecognized)`, never errors.
    fn decode(&self, payload: &[u8]) -> Result<DecodedEvent, WebhookError>;
}
