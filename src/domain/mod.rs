//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, state machines)
//! - `subscription` - Subscription record, canonical webhook events, price
//!   catalog, promotion arithmetic and signature verification

pub mod foundation;
pub mod subscription;
