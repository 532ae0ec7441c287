//! Stripe payment provider adapter.

mod stripe_adapter;
mod webhook_types;

pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use webhook_types::{SignatureHeader, SignatureParseError};
