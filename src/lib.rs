//! Subscription Sync - Payment webhook reconciliation service
//!
//! Turns signed webhook deliveries from the primary billing provider and the
//! mobile app store into field-filtered updates of one canonical
//! subscription record per user or community. Also creates checkout and
//! billing-portal sessions whose metadata lets the completion webhook find
//! its principal again.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
