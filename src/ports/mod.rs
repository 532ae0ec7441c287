//! Ports: contracts between the application core and the outside world.

mod auth_provider;
mod payment_provider;
mod subscription_repository;
mod webhook_event_repository;

pub use auth_provider::AuthProvider;
pub use payment_provider::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentErrorCode, PaymentProvider, ProviderSubscription, WebhookEvent, WebhookEventData,
    WebhookEventType,
};
pub use subscription_repository::SubscriptionRepository;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};
