use std::sync::Arc;

use crate::{
    application::use_cases::{
        callback::CallbackProcessor, status_query::StatusQueryService,
        subscription_lifecycle::SubscriptionLifecycleManager,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub lifecycle: Arc<SubscriptionLifecycleManager>,
    pub callbacks: Arc<CallbackProcessor>,
    pub status_query: Arc<StatusQueryService>,
}
