//! Marketing Buddy - Subscription Billing Core
//!
//! This crate implements the billing backbone of the Marketing Buddy
//! application: Stripe checkout initiation, webhook reconciliation of
//! subscription state, and account cancellation/deletion.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
