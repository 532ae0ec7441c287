//! Marketing Buddy billing service entry point.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use marketing_buddy::adapters::auth::{GoTrueAuthAdapter, GoTrueConfig};
use marketing_buddy::adapters::http::billing::{billing_router, BillingAppState};
use marketing_buddy::adapters::postgres::{
    PostgresSubscriptionRepository, PostgresWebhookEventRepository,
};
use marketing_buddy::adapters::stripe::{StripeConfig, StripePaymentAdapter};
use marketing_buddy::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .json()
        .init();

    tracing::info!(
        environment = ?config.server.environment,
        stripe_test_mode = config.payment.is_test_mode(),
        "Starting billing service"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let mut stripe_config = StripeConfig::new(
        config.payment.stripe_secret_key.clone(),
        config.payment.stripe_webhook_secret.clone(),
    );
    if let Some(price_id) = &config.payment.stripe_pro_price_id {
        stripe_config = stripe_config.with_pro_price_id(price_id.clone());
    }

    let state = BillingAppState {
        subscription_repository: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        webhook_event_repository: Arc::new(PostgresWebhookEventRepository::new(pool)),
        payment_provider: Arc::new(StripePaymentAdapter::new(stripe_config)),
        auth_provider: Arc::new(GoTrueAuthAdapter::new(GoTrueConfig::new(
            config.auth.base_url.clone(),
            config.auth.service_role_key.clone(),
        ))),
        public_app_url: config.server.public_app_url.clone(),
    };

    let app = axum::Router::new()
        .nest("/api", billing_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = config.server.socket_addr();
    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
