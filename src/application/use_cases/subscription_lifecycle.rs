//! Subscription lifecycle: creation, cancellation, and the state machine
//! applied when a verified gateway outcome lands.
//!
//! All subscription mutation goes through version-guarded store operations;
//! a losing writer re-reads and retries a bounded number of times.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        billing_notifier::{BillingEvent, BillingNotifier},
        momo_gateway::{ChargePrompt, ChargeReference, ChargeRequest, MomoGatewayPort, VerifyOutcome},
    },
    application::use_cases::billing_schedule,
    domain::entities::{
        momo_network::MomoNetwork,
        payment_attempt::{AttemptStatus, PaymentAttempt},
        subscription::{BillingPeriod, Subscription, SubscriptionStatus},
    },
};

/// Read-modify-write retries before giving up with `TemporarilyUnavailable`.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

pub const DEFAULT_MAX_FAILURES: i32 = 3;

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateSubscriptionInput {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: String,
    pub phone: String,
    pub network: MomoNetwork,
    pub amount_pesewas: i64,
    pub billing_period: BillingPeriod,
    pub latest_reference: Option<String>,
}

/// Versioned update applied to a subscription row. `None` date fields keep
/// the stored value.
#[derive(Debug, Clone)]
pub struct SubscriptionUpdate {
    pub status: SubscriptionStatus,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub failure_count: i32,
    pub latest_reference: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordAttemptInput {
    pub reference: String,
    pub subscription_id: Uuid,
    pub status: AttemptStatus,
    pub gateway_code: Option<String>,
    pub raw_metadata: serde_json::Value,
}

/// Outcome of the atomic attempt-insert + guarded subscription update.
#[derive(Debug, Clone)]
pub enum PaymentOutcomeCommit {
    /// This caller won: the attempt row was inserted and the subscription
    /// updated in one transaction.
    Applied {
        subscription: Subscription,
        attempt: PaymentAttempt,
    },
    /// The reference was already reconciled; the stored attempt is returned
    /// and the subscription was left untouched.
    AlreadyProcessed(PaymentAttempt),
}

#[derive(Debug, Clone)]
pub enum AttemptInsert {
    Inserted(PaymentAttempt),
    Existing(PaymentAttempt),
}

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>>;

    /// The at-most-one live subscription per (user, tier), if any.
    async fn get_live_by_user_and_tier(
        &self,
        user_id: Uuid,
        tier: &str,
    ) -> AppResult<Option<Subscription>>;

    async fn get_by_latest_reference(&self, reference: &str) -> AppResult<Option<Subscription>>;

    async fn create(&self, input: &CreateSubscriptionInput) -> AppResult<Subscription>;

    /// Conditional update keyed on the stored version. Fails with
    /// `ConcurrentUpdate` when the version no longer matches.
    async fn update_guarded(
        &self,
        id: Uuid,
        expected_version: i32,
        update: &SubscriptionUpdate,
    ) -> AppResult<Subscription>;

    /// One atomic unit: insert the attempt (idempotent on `reference`) and,
    /// only if this reference is new, apply the guarded update. The
    /// idempotency check and the insert share the same transaction, so two
    /// concurrent callers cannot both observe "not yet processed".
    async fn commit_payment_outcome(
        &self,
        id: Uuid,
        expected_version: i32,
        update: &SubscriptionUpdate,
        attempt: &RecordAttemptInput,
    ) -> AppResult<PaymentOutcomeCommit>;
}

#[async_trait]
pub trait PaymentAttemptRepo: Send + Sync {
    async fn get_by_reference(&self, reference: &str) -> AppResult<Option<PaymentAttempt>>;

    async fn list_by_subscription(&self, subscription_id: Uuid)
    -> AppResult<Vec<PaymentAttempt>>;

    /// Record an attempt without touching the subscription (terminal-state
    /// audit path). Idempotent on `reference`.
    async fn insert_if_absent(&self, input: &RecordAttemptInput) -> AppResult<AttemptInsert>;
}

// ============================================================================
// State machine
// ============================================================================

/// What a verified gateway outcome does to a subscription.
#[derive(Debug, Clone)]
pub(crate) struct TransitionPlan {
    /// `None` means the subscription is terminal: record the attempt for
    /// audit, mutate nothing.
    pub update: Option<SubscriptionUpdate>,
    pub attempt_status: AttemptStatus,
    pub event: Option<BillingEvent>,
}

/// Pure transition planning for a verified outcome, per the lifecycle table.
/// The `active -> overdue` relabel is folded in here from schedule facts, so
/// an overdue-but-unrelabelled subscription takes the overdue failure path.
pub(crate) fn plan_payment_transition(
    subscription: &Subscription,
    verified: bool,
    now: DateTime<Utc>,
    max_failures: i32,
) -> TransitionPlan {
    if subscription.status.is_terminal() {
        // Cancellation (and failure) wins over late callbacks. Keep the
        // attempt for the audit trail only.
        return TransitionPlan {
            update: None,
            attempt_status: if verified {
                AttemptStatus::Success
            } else {
                AttemptStatus::Failed
            },
            event: None,
        };
    }

    let facts = billing_schedule::evaluate(subscription, now);
    let effective_status =
        if subscription.status == SubscriptionStatus::Active && facts.needs_payment {
            SubscriptionStatus::Overdue
        } else {
            subscription.status
        };

    if verified {
        // last_payment_date is monotonically non-decreasing even if a stale
        // callback carries an old clock.
        let last = subscription
            .last_payment_date
            .map_or(now, |prev| prev.max(now));
        let next = last + Duration::days(subscription.billing_period.days());
        return TransitionPlan {
            update: Some(SubscriptionUpdate {
                status: SubscriptionStatus::Active,
                last_payment_date: Some(last),
                next_payment_date: Some(next),
                failure_count: 0,
                latest_reference: None,
            }),
            attempt_status: AttemptStatus::Success,
            event: None,
        };
    }

    let failure_count = subscription.failure_count + 1;
    let (status, event) = match effective_status {
        SubscriptionStatus::Pending => (SubscriptionStatus::Pending, None),
        SubscriptionStatus::Overdue if failure_count >= max_failures => (
            SubscriptionStatus::Failed,
            Some(BillingEvent::SubscriptionFailed {
                subscription_id: subscription.id,
                user_id: subscription.user_id,
                failure_count,
            }),
        ),
        SubscriptionStatus::Overdue => (
            SubscriptionStatus::Overdue,
            Some(BillingEvent::PaymentOverdue {
                subscription_id: subscription.id,
                user_id: subscription.user_id,
                days_overdue: facts.days_overdue,
            }),
        ),
        // A failed verification while current: count it, stay active. The
        // schedule relabel moves the row to overdue once the due date passes.
        other => (other, None),
    };

    TransitionPlan {
        update: Some(SubscriptionUpdate {
            status,
            last_payment_date: None,
            next_payment_date: None,
            failure_count,
            latest_reference: None,
        }),
        attempt_status: AttemptStatus::Failed,
        event,
    }
}

// ============================================================================
// Lifecycle manager
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub user_id: Uuid,
    pub tier: String,
    pub phone: String,
    pub network: MomoNetwork,
    pub amount_pesewas: i64,
    pub billing_period: BillingPeriod,
}

#[derive(Debug, Clone)]
pub struct CreatedSubscription {
    pub subscription: Subscription,
    pub reference: ChargeReference,
    pub prompt: ChargePrompt,
}

#[derive(Debug, Clone)]
pub struct AppliedPaymentResult {
    pub subscription: Subscription,
    pub attempt: PaymentAttempt,
    pub replayed: bool,
}

#[derive(Clone)]
pub struct SubscriptionLifecycleManager {
    subscriptions: Arc<dyn SubscriptionRepo>,
    attempts: Arc<dyn PaymentAttemptRepo>,
    gateway: Arc<dyn MomoGatewayPort>,
    notifier: Arc<dyn BillingNotifier>,
    max_failures: i32,
    currency: String,
}

impl SubscriptionLifecycleManager {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepo>,
        attempts: Arc<dyn PaymentAttemptRepo>,
        gateway: Arc<dyn MomoGatewayPort>,
        notifier: Arc<dyn BillingNotifier>,
        max_failures: i32,
        currency: String,
    ) -> Self {
        Self {
            subscriptions,
            attempts,
            gateway,
            notifier,
            max_failures,
            currency,
        }
    }

    /// Checkout intent: raise the first charge, then persist the pending
    /// subscription. The gateway call happens first so a gateway rejection
    /// leaves no local row behind.
    pub async fn create_subscription(
        &self,
        request: &CreateSubscriptionRequest,
    ) -> AppResult<CreatedSubscription> {
        if request.tier.trim().is_empty() {
            return Err(AppError::InvalidInput("tier must not be empty".into()));
        }
        if request.amount_pesewas <= 0 {
            return Err(AppError::InvalidInput("amount must be positive".into()));
        }
        if request.phone.trim().is_empty() {
            return Err(AppError::InvalidPhoneOrNetwork("phone is required".into()));
        }

        if self
            .subscriptions
            .get_live_by_user_and_tier(request.user_id, &request.tier)
            .await?
            .is_some()
        {
            return Err(AppError::InvalidInput(
                "a live subscription already exists for this user and tier".into(),
            ));
        }

        let subscription_id = Uuid::new_v4();
        let charge = ChargeRequest {
            subscription_id,
            user_id: request.user_id,
            tier: request.tier.clone(),
            phone: request.phone.clone(),
            network: request.network,
            amount_pesewas: request.amount_pesewas,
            currency: self.currency.clone(),
        };
        let init = self.gateway.initiate_charge(&charge).await?;

        let subscription = self
            .subscriptions
            .create(&CreateSubscriptionInput {
                id: subscription_id,
                user_id: request.user_id,
                tier: request.tier.clone(),
                phone: request.phone.clone(),
                network: request.network,
                amount_pesewas: request.amount_pesewas,
                billing_period: request.billing_period,
                latest_reference: Some(init.reference.as_str().to_string()),
            })
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            tier = %subscription.tier,
            reference = %init.reference,
            "Created pending subscription with initial charge"
        );

        Ok(CreatedSubscription {
            subscription,
            reference: init.reference,
            prompt: init.prompt,
        })
    }

    /// User-initiated cancellation. The gateway mandate teardown is
    /// best-effort; local state always ends up `cancelled`.
    pub async fn cancel(&self, user_id: Uuid, subscription_id: Uuid) -> AppResult<Subscription> {
        let mut subscription = self
            .subscriptions
            .get_by_id(subscription_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or(AppError::SubscriptionNotFound)?;

        if subscription.status.is_terminal() {
            return Ok(subscription);
        }

        match self.gateway.cancel_mandate(&subscription).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    subscription_id = %subscription_id,
                    "Gateway declined mandate cancellation, cancelling locally anyway"
                );
            }
            Err(e) => {
                warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "Mandate cancellation failed, cancelling locally anyway"
                );
            }
        }

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            if subscription.status.is_terminal() {
                return Ok(subscription);
            }
            let update = SubscriptionUpdate {
                status: SubscriptionStatus::Cancelled,
                last_payment_date: None,
                next_payment_date: None,
                failure_count: subscription.failure_count,
                latest_reference: None,
            };
            match self
                .subscriptions
                .update_guarded(subscription_id, subscription.version, &update)
                .await
            {
                Ok(updated) => {
                    tracing::info!(subscription_id = %subscription_id, "Subscription cancelled");
                    return Ok(updated);
                }
                Err(AppError::ConcurrentUpdate) => {
                    subscription = self
                        .subscriptions
                        .get_by_id(subscription_id)
                        .await?
                        .ok_or(AppError::SubscriptionNotFound)?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::TemporarilyUnavailable)
    }

    /// Apply a verified gateway outcome to a subscription. Idempotent on the
    /// reference and safe under concurrent invocation; version-conflict
    /// losers retry against fresh state so a cancellation that lands
    /// mid-flight wins.
    pub async fn apply_payment_result(
        &self,
        subscription_id: Uuid,
        reference: &ChargeReference,
        outcome: &VerifyOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<AppliedPaymentResult> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let subscription = self
                .subscriptions
                .get_by_id(subscription_id)
                .await?
                .ok_or(AppError::SubscriptionNotFound)?;

            let plan =
                plan_payment_transition(&subscription, outcome.verified, now, self.max_failures);
            let attempt_input = RecordAttemptInput {
                reference: reference.as_str().to_string(),
                subscription_id,
                status: plan.attempt_status,
                gateway_code: outcome.gateway_code.clone(),
                raw_metadata: outcome.raw.clone(),
            };

            let Some(update) = plan.update else {
                // Terminal state: audit-only path.
                let attempt = match self.attempts.insert_if_absent(&attempt_input).await? {
                    AttemptInsert::Inserted(a) => {
                        return Ok(AppliedPaymentResult {
                            subscription,
                            attempt: a,
                            replayed: false,
                        });
                    }
                    AttemptInsert::Existing(a) => a,
                };
                return Ok(AppliedPaymentResult {
                    subscription,
                    attempt,
                    replayed: true,
                });
            };

            match self
                .subscriptions
                .commit_payment_outcome(
                    subscription_id,
                    subscription.version,
                    &update,
                    &attempt_input,
                )
                .await
            {
                Ok(PaymentOutcomeCommit::Applied {
                    subscription: updated,
                    attempt,
                }) => {
                    if let Some(event) = plan.event {
                        // Notification delivery is external; a notifier error
                        // must not fail an already-committed reconciliation.
                        if let Err(e) = self.notifier.notify(event).await {
                            warn!(
                                subscription_id = %subscription_id,
                                error = %e,
                                "Billing event notification failed"
                            );
                        }
                    }
                    return Ok(AppliedPaymentResult {
                        subscription: updated,
                        attempt,
                        replayed: false,
                    });
                }
                Ok(PaymentOutcomeCommit::AlreadyProcessed(attempt)) => {
                    // A concurrent caller won the reference; re-read so the
                    // replayed result reflects the committed state.
                    let current = self
                        .subscriptions
                        .get_by_id(subscription_id)
                        .await?
                        .ok_or(AppError::SubscriptionNotFound)?;
                    return Ok(AppliedPaymentResult {
                        subscription: current,
                        attempt,
                        replayed: true,
                    });
                }
                Err(AppError::ConcurrentUpdate) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(AppError::TemporarilyUnavailable)
    }
}
