//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `stripe` - Stripe event decoding and REST client
//! - `app_store` - Mobile in-app-purchase event decoding
//! - `postgres` - sqlx-backed stores
//! - `memory` - In-memory stores for tests and local runs
//! - `http` - axum routes

pub mod app_store;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
