//! Billing command handlers.

mod cancel_subscription;
mod create_checkout;
mod delete_account;
mod process_webhook;

pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use create_checkout::{CreateCheckoutCommand, CreateCheckoutHandler, CreateCheckoutResult};
pub use delete_account::{DeleteAccountCommand, DeleteAccountHandler, DeleteAccountResult};
pub use process_webhook::{ProcessWebhookCommand, ProcessWebhookHandler, ProcessWebhookResult};
