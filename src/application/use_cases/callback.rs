//! Reconciliation of a gateway transaction reference against local state.
//!
//! Webhook deliveries and client-initiated verification polls both land
//! here, possibly concurrently and possibly more than once per reference.
//! The attempt log is the idempotency barrier: one reference, one
//! subscription transition, ever.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::momo_gateway::{ChargeReference, MomoGatewayPort, VerifyOutcome},
    application::use_cases::subscription_lifecycle::{
        PaymentAttemptRepo, SubscriptionLifecycleManager, SubscriptionRepo,
    },
    domain::entities::{payment_attempt::AttemptStatus, subscription::SubscriptionStatus},
};

/// Logical result of reconciling one reference. Replays return the same
/// result as the call that originally processed the reference.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedResult {
    pub reference: String,
    pub subscription_id: Uuid,
    pub subscription_status: SubscriptionStatus,
    pub attempt_status: AttemptStatus,
    pub replayed: bool,
}

#[derive(Clone)]
pub struct CallbackProcessor {
    subscriptions: Arc<dyn SubscriptionRepo>,
    attempts: Arc<dyn PaymentAttemptRepo>,
    gateway: Arc<dyn MomoGatewayPort>,
    lifecycle: Arc<SubscriptionLifecycleManager>,
}

impl CallbackProcessor {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepo>,
        attempts: Arc<dyn PaymentAttemptRepo>,
        gateway: Arc<dyn MomoGatewayPort>,
        lifecycle: Arc<SubscriptionLifecycleManager>,
    ) -> Self {
        Self {
            subscriptions,
            attempts,
            gateway,
            lifecycle,
        }
    }

    /// Reconcile one reference. Safe to call repeatedly and concurrently.
    ///
    /// Gateway timeouts propagate without recording anything locally; the
    /// gateway's redelivery (or the client's re-poll) is the retry loop.
    pub async fn process(&self, reference: &ChargeReference) -> AppResult<ProcessedResult> {
        // Fast path for replays. The authoritative duplicate check happens
        // again inside the store transaction; this one just spares the
        // gateway a verify round-trip.
        if let Some(attempt) = self.attempts.get_by_reference(reference.as_str()).await? {
            let subscription = self
                .subscriptions
                .get_by_id(attempt.subscription_id)
                .await?
                .ok_or(AppError::SubscriptionNotFound)?;
            info!(reference = %reference, "Reference already reconciled, replaying result");
            return Ok(ProcessedResult {
                reference: reference.as_str().to_string(),
                subscription_id: attempt.subscription_id,
                subscription_status: subscription.status,
                attempt_status: attempt.status,
                replayed: true,
            });
        }

        let outcome = match self.gateway.verify(reference).await {
            Ok(outcome) => outcome,
            // A reference the gateway has lost track of counts as a failed
            // verification, provided we can still tell whose charge it was.
            Err(AppError::ReferenceNotFound) => VerifyOutcome {
                verified: false,
                amount_confirmed: None,
                gateway_code: Some("reference_not_found".into()),
                subscription_id: None,
                raw: serde_json::json!({ "error": "reference_not_found" }),
            },
            Err(e) => return Err(e),
        };

        let subscription_id = match outcome.subscription_id {
            Some(id) => id,
            None => {
                self.subscriptions
                    .get_by_latest_reference(reference.as_str())
                    .await?
                    .map(|s| s.id)
                    .ok_or(AppError::ReferenceNotFound)?
            }
        };

        let applied = self
            .lifecycle
            .apply_payment_result(subscription_id, reference, &outcome, Utc::now())
            .await?;

        if !applied.replayed {
            info!(
                reference = %reference,
                subscription_id = %subscription_id,
                attempt_status = applied.attempt.status.as_str(),
                subscription_status = applied.subscription.status.as_str(),
                "Reconciled payment reference"
            );
        }

        Ok(ProcessedResult {
            reference: reference.as_str().to_string(),
            subscription_id,
            subscription_status: applied.subscription.status,
            attempt_status: applied.attempt.status,
            replayed: applied.replayed,
        })
    }
}
