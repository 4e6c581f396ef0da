//! Mobile in-app purchase provider adapter.
//!
//! Decodes the app store's webhook envelope into canonical events. The app
//! store has no outbound API use here: its payloads are self-contained.

mod decoder;
mod webhook_types;

pub use decoder::AppStoreWebhookDecoder;
pub use webhook_types::{AppStoreEventBody, AppStoreWebhookEnvelope};
