//! Adapters: concrete implementations of the ports.

pub mod auth;
pub mod http;
pub mod postgres;
pub mod stripe;
