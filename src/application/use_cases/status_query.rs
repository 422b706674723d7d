//! Read path for client polls: schedule facts over the stored subscription.
//!
//! Strictly read-only. The overdue relabel is reported to the caller but
//! never persisted here; the write path picks it up on the next
//! payment-result application.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::billing_schedule,
    application::use_cases::subscription_lifecycle::{PaymentAttemptRepo, SubscriptionRepo},
    domain::entities::{payment_attempt::PaymentAttempt, subscription::SubscriptionStatus},
};

#[derive(Debug, Clone, Serialize)]
pub struct StatusCheck {
    pub subscription_id: Uuid,
    pub tier: String,
    /// Stored status with the read-time overdue relabel applied.
    pub status: SubscriptionStatus,
    /// Whether the subscriber currently has feature access. Overdue keeps
    /// access until the subscription fails out.
    pub has_access: bool,
    pub needs_payment: bool,
    pub days_overdue: i64,
    pub days_until_next_payment: Option<i64>,
    pub next_payment_date: DateTime<Utc>,
    pub failure_count: i32,
    pub payment_initiation_handle: Option<String>,
}

#[derive(Clone)]
pub struct StatusQueryService {
    subscriptions: Arc<dyn SubscriptionRepo>,
    attempts: Arc<dyn PaymentAttemptRepo>,
}

impl StatusQueryService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepo>,
        attempts: Arc<dyn PaymentAttemptRepo>,
    ) -> Self {
        Self {
            subscriptions,
            attempts,
        }
    }

    pub async fn check_status(&self, user_id: Uuid, tier: &str) -> AppResult<StatusCheck> {
        self.check_status_at(user_id, tier, Utc::now()).await
    }

    /// Clock-injected variant; `check_status` passes wall-clock time.
    pub async fn check_status_at(
        &self,
        user_id: Uuid,
        tier: &str,
        now: DateTime<Utc>,
    ) -> AppResult<StatusCheck> {
        let subscription = self
            .subscriptions
            .get_live_by_user_and_tier(user_id, tier)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;

        let facts = billing_schedule::evaluate(&subscription, now);
        let status = if subscription.status == SubscriptionStatus::Active && facts.needs_payment {
            SubscriptionStatus::Overdue
        } else {
            subscription.status
        };

        Ok(StatusCheck {
            subscription_id: subscription.id,
            tier: subscription.tier,
            status,
            has_access: status.grants_access(),
            needs_payment: facts.needs_payment,
            days_overdue: facts.days_overdue,
            days_until_next_payment: facts.days_until_next_payment,
            next_payment_date: facts.next_payment_date,
            failure_count: subscription.failure_count,
            payment_initiation_handle: facts.payment_initiation_handle,
        })
    }

    /// Audit-trail read: every attempt ever reconciled for a subscription.
    pub async fn list_attempts(&self, subscription_id: Uuid) -> AppResult<Vec<PaymentAttempt>> {
        self.subscriptions
            .get_by_id(subscription_id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;
        self.attempts.list_by_subscription(subscription_id).await
    }
}
