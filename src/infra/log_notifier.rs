//! Log-only notifier. Downstream delivery (SMS, email) hangs off these
//! structured lines; the billing core only emits the events.

use async_trait::async_trait;
use tracing::warn;

use crate::{
    app_error::AppResult,
    application::ports::billing_notifier::{BillingEvent, BillingNotifier},
};

#[derive(Default, Clone)]
pub struct LogBillingNotifier;

impl LogBillingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BillingNotifier for LogBillingNotifier {
    async fn notify(&self, event: BillingEvent) -> AppResult<()> {
        match event {
            BillingEvent::SubscriptionFailed {
                subscription_id,
                user_id,
                failure_count,
            } => {
                warn!(
                    subscription_id = %subscription_id,
                    user_id = %user_id,
                    failure_count,
                    "Subscription closed after repeated payment failures"
                );
            }
            BillingEvent::PaymentOverdue {
                subscription_id,
                user_id,
                days_overdue,
            } => {
                warn!(
                    subscription_id = %subscription_id,
                    user_id = %user_id,
                    days_overdue,
                    "Subscription payment overdue"
                );
            }
        }
        Ok(())
    }
}
