//! PostgreSQL adapters - Database implementations for the store ports.
//!
//! - `PostgresSubscriptionStore` - Subscription sub-records on users and communities
//! - `PostgresEntitlementReader` - Standalone entitlement grants

mod entitlement_reader;
mod subscription_store;

pub use entitlement_reader::PostgresEntitlementReader;
pub use subscription_store::PostgresSubscriptionStore;
