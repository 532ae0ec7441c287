//! PostgreSQL adapters for the repository ports.

mod subscription_repository;
mod webhook_event_repository;

pub use subscription_repository::PostgresSubscriptionRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;
