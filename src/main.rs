use std::error::Error;
use std::sync::Arc;

use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use subscription_sync::adapters::app_store::AppStoreWebhookDecoder;
use subscription_sync::adapters::http::{build_router, SubscriptionAppState};
use subscription_sync::adapters::postgres::{PostgresEntitlementReader, PostgresSubscriptionStore};
use subscription_sync::adapters::stripe::{StripeConfig, StripePaymentAdapter, StripeWebhookDecoder};
use subscription_sync::application::handlers::subscription::{
    CreateCheckoutSessionHandler, CreatePortalSessionHandler, EntitlementFallback,
    HandleAppStoreWebhookHandler, HandleStripeWebhookHandler, PaymentFailurePolicy,
    SubscriptionReconciler,
};
use subscription_sync::config::AppConfig;
use subscription_sync::domain::subscription::{PriceCatalog, WebhookVerifier};
use subscription_sync::ports::{PaymentProvider, SubscriptionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let catalog = Arc::new(PriceCatalog::from_path(&config.payment.price_catalog_path)?);
    tracing::info!(
        prices = catalog.len(),
        path = %config.payment.price_catalog_path.display(),
        "Price catalog loaded"
    );

    let pool = config.database.pool_options().connect(&config.database.url).await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let state = build_state(&config, pool, catalog)?;
    let app = build_router(state, &config.server.cors_origins_list());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_state(
    config: &AppConfig,
    pool: PgPool,
    catalog: Arc<PriceCatalog>,
) -> Result<SubscriptionAppState, Box<dyn Error>> {
    let payment = &config.payment;

    let store: Arc<dyn SubscriptionStore> = Arc::new(PostgresSubscriptionStore::new(pool.clone()));
    let entitlements = Arc::new(PostgresEntitlementReader::new(pool));
    let provider: Arc<dyn PaymentProvider> = Arc::new(StripePaymentAdapter::new(
        StripeConfig::new(payment.stripe_api_key.clone())
            .with_base_url(payment.stripe_api_base_url.clone())
            .with_timeout(config.server.request_timeout()),
    )?);

    let reconciler = Arc::new(
        SubscriptionReconciler::new(
            store.clone(),
            catalog.clone(),
            EntitlementFallback::new(entitlements),
        )
        .with_payment_failure_policy(PaymentFailurePolicy::from_grace_days(
            payment.payment_failure_grace_days,
        )),
    );

    let tolerance = payment.signature_tolerance_secs;
    let stripe_webhook = HandleStripeWebhookHandler::new(
        WebhookVerifier::new(payment.stripe_webhook_secret.clone()).with_tolerance(tolerance),
        Arc::new(StripeWebhookDecoder::new().with_require_livemode(payment.stripe_require_livemode)),
        provider.clone(),
        reconciler.clone(),
    );
    let app_store_webhook = HandleAppStoreWebhookHandler::new(
        WebhookVerifier::new(payment.app_store_webhook_secret.clone()).with_tolerance(tolerance),
        Arc::new(AppStoreWebhookDecoder::new()),
        reconciler,
    );

    Ok(SubscriptionAppState {
        stripe_webhook: Arc::new(stripe_webhook),
        app_store_webhook: Arc::new(app_store_webhook),
        create_checkout: Arc::new(CreateCheckoutSessionHandler::new(
            store.clone(),
            provider.clone(),
            catalog,
            payment.checkout_success_url.clone(),
            payment.checkout_cancel_url.clone(),
        )),
        create_portal: Arc::new(CreatePortalSessionHandler::new(
            store,
            provider,
            payment.portal_return_url.clone(),
        )),
        request_timeout: config.server.request_timeout(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
