//! In-memory adapters for tests and local development.

mod entitlement_reader;
mod subscription_store;

pub use entitlement_reader::InMemoryEntitlementReader;
pub use subscription_store::InMemorySubscriptionStore;
