//! Test app state builder for HTTP-level integration testing.
//!
//! Creates a minimal `AppState` wired to the in-memory store and mock
//! gateway, so route tests run without Postgres or the real gateway.

use std::sync::Arc;

use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        callback::CallbackProcessor,
        status_query::StatusQueryService,
        subscription_lifecycle::{DEFAULT_MAX_FAILURES, SubscriptionLifecycleManager},
    },
    infra::config::AppConfig,
    test_utils::{CollectingNotifier, InMemoryBillingStore, MockMomoGateway},
};

pub const TEST_WEBHOOK_SECRET: &str = "test_webhook_secret";

fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        cors_origin: "http://localhost:3000".parse().unwrap(),
        gateway_base_url: "http://gateway.invalid".to_string(),
        gateway_secret_key: SecretString::new(TEST_WEBHOOK_SECRET.into()),
        gateway_timeout_secs: 1,
        max_payment_failures: DEFAULT_MAX_FAILURES,
        currency: "GHS".to_string(),
    }
}

pub struct TestAppStateBuilder {
    store: Arc<InMemoryBillingStore>,
    gateway: Arc<MockMomoGateway>,
    notifier: Arc<CollectingNotifier>,
}

impl TestAppStateBuilder {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryBillingStore::new()),
            gateway: Arc::new(MockMomoGateway::new()),
            notifier: Arc::new(CollectingNotifier::new()),
        }
    }

    /// Handle on the backing store, for seeding and post-request assertions.
    pub fn store(&self) -> Arc<InMemoryBillingStore> {
        self.store.clone()
    }

    pub fn gateway(&self) -> Arc<MockMomoGateway> {
        self.gateway.clone()
    }

    pub fn build(&self) -> AppState {
        let config = Arc::new(test_config());

        let lifecycle = Arc::new(SubscriptionLifecycleManager::new(
            self.store.clone(),
            self.store.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
            config.max_payment_failures,
            config.currency.clone(),
        ));

        let callbacks = Arc::new(CallbackProcessor::new(
            self.store.clone(),
            self.store.clone(),
            self.gateway.clone(),
            lifecycle.clone(),
        ));

        let status_query = Arc::new(StatusQueryService::new(
            self.store.clone(),
            self.store.clone(),
        ));

        AppState {
            config,
            lifecycle,
            callbacks,
            status_query,
        }
    }
}
