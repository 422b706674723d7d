use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::ports::{billing_notifier::BillingNotifier, momo_gateway::MomoGatewayPort},
    application::use_cases::{
        callback::CallbackProcessor,
        status_query::StatusQueryService,
        subscription_lifecycle::{
            PaymentAttemptRepo, SubscriptionLifecycleManager, SubscriptionRepo,
        },
    },
    infra::{
        config::AppConfig, log_notifier::LogBillingNotifier, paystack_client::PaystackClient,
        postgres_persistence,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let subscriptions = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let attempts = postgres_arc.clone() as Arc<dyn PaymentAttemptRepo>;

    let gateway = Arc::new(PaystackClient::new(
        config.gateway_base_url.clone(),
        config.gateway_secret_key.clone(),
        config.gateway_timeout_secs,
    )?) as Arc<dyn MomoGatewayPort>;

    let notifier = Arc::new(LogBillingNotifier::new()) as Arc<dyn BillingNotifier>;

    let lifecycle = Arc::new(SubscriptionLifecycleManager::new(
        subscriptions.clone(),
        attempts.clone(),
        gateway.clone(),
        notifier,
        config.max_payment_failures,
        config.currency.clone(),
    ));

    let callbacks = Arc::new(CallbackProcessor::new(
        subscriptions.clone(),
        attempts.clone(),
        gateway,
        lifecycle.clone(),
    ));

    let status_query = Arc::new(StatusQueryService::new(subscriptions, attempts));

    Ok(AppState {
        config: Arc::new(config),
        lifecycle,
        callbacks,
        status_query,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "subpay_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
