use async_trait::async_trait;
use uuid::Uuid;

use crate::app_error::AppResult;

/// Domain events the billing core emits for an external notifier to deliver.
/// The core never formats or sends the user-facing message itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    /// The subscription crossed the failure threshold and is now terminal.
    SubscriptionFailed {
        subscription_id: Uuid,
        user_id: Uuid,
        failure_count: i32,
    },
    /// A verified failure left the subscription overdue.
    PaymentOverdue {
        subscription_id: Uuid,
        user_id: Uuid,
        days_overdue: i64,
    },
}

#[async_trait]
pub trait BillingNotifier: Send + Sync {
    async fn notify(&self, event: BillingEvent) -> AppResult<()>;
}
