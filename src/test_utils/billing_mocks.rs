//! In-memory mock implementation for the billing repository traits.
//!
//! One store implements both `SubscriptionRepo` and `PaymentAttemptRepo`
//! behind a single lock, so the atomicity of `commit_payment_outcome` holds
//! here the same way it does in the Postgres adapter. Concurrency tests
//! against this store exercise the real version-conflict retry paths.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::subscription_lifecycle::{
        AttemptInsert, CreateSubscriptionInput, PaymentAttemptRepo, PaymentOutcomeCommit,
        RecordAttemptInput, SubscriptionRepo, SubscriptionUpdate,
    },
    domain::entities::{
        payment_attempt::PaymentAttempt,
        subscription::{Subscription, SubscriptionStatus},
    },
};

#[derive(Default)]
struct StoreInner {
    subscriptions: HashMap<Uuid, Subscription>,
    // Keyed by reference, mirroring the UNIQUE constraint.
    attempts: HashMap<String, PaymentAttempt>,
}

#[derive(Default)]
pub struct InMemoryBillingStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_subscription(&self, subscription: Subscription) -> Subscription {
        let mut inner = self.inner.lock().unwrap();
        inner
            .subscriptions
            .insert(subscription.id, subscription.clone());
        subscription
    }

    pub fn attempt_count(&self) -> usize {
        self.inner.lock().unwrap().attempts.len()
    }
}

fn apply_update(subscription: &mut Subscription, update: &SubscriptionUpdate) {
    subscription.status = update.status;
    if let Some(last) = update.last_payment_date {
        subscription.last_payment_date = Some(last);
    }
    if let Some(next) = update.next_payment_date {
        subscription.next_payment_date = Some(next);
    }
    subscription.failure_count = update.failure_count;
    if let Some(reference) = &update.latest_reference {
        subscription.latest_reference = Some(reference.clone());
    }
    subscription.version += 1;
    subscription.updated_at = Some(Utc::now());
}

fn attempt_from_input(input: &RecordAttemptInput) -> PaymentAttempt {
    PaymentAttempt {
        id: Uuid::new_v4(),
        reference: input.reference.clone(),
        subscription_id: input.subscription_id,
        status: input.status,
        gateway_code: input.gateway_code.clone(),
        raw_metadata: input.raw_metadata.clone(),
        processed_at: Utc::now(),
    }
}

#[async_trait]
impl SubscriptionRepo for InMemoryBillingStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.inner.lock().unwrap().subscriptions.get(&id).cloned())
    }

    async fn get_live_by_user_and_tier(
        &self,
        user_id: Uuid,
        tier: &str,
    ) -> AppResult<Option<Subscription>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .find(|s| s.user_id == user_id && s.tier == tier && s.status.is_live())
            .cloned())
    }

    async fn get_by_latest_reference(&self, reference: &str) -> AppResult<Option<Subscription>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .find(|s| s.latest_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn create(&self, input: &CreateSubscriptionInput) -> AppResult<Subscription> {
        let now = Utc::now();
        let subscription = Subscription {
            id: input.id,
            user_id: input.user_id,
            tier: input.tier.clone(),
            phone: input.phone.clone(),
            network: input.network,
            amount_pesewas: input.amount_pesewas,
            billing_period: input.billing_period,
            status: SubscriptionStatus::Pending,
            last_payment_date: None,
            next_payment_date: None,
            failure_count: 0,
            latest_reference: input.latest_reference.clone(),
            version: 1,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn update_guarded(
        &self,
        id: Uuid,
        expected_version: i32,
        update: &SubscriptionUpdate,
    ) -> AppResult<Subscription> {
        let mut inner = self.inner.lock().unwrap();
        let subscription = inner
            .subscriptions
            .get_mut(&id)
            .ok_or(AppError::SubscriptionNotFound)?;
        if subscription.version != expected_version {
            return Err(AppError::ConcurrentUpdate);
        }
        apply_update(subscription, update);
        Ok(subscription.clone())
    }

    async fn commit_payment_outcome(
        &self,
        id: Uuid,
        expected_version: i32,
        update: &SubscriptionUpdate,
        attempt: &RecordAttemptInput,
    ) -> AppResult<PaymentOutcomeCommit> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner.attempts.get(&attempt.reference) {
            return Ok(PaymentOutcomeCommit::AlreadyProcessed(existing.clone()));
        }

        let subscription = inner
            .subscriptions
            .get(&id)
            .ok_or(AppError::SubscriptionNotFound)?;
        if subscription.version != expected_version {
            return Err(AppError::ConcurrentUpdate);
        }

        let stored_attempt = attempt_from_input(attempt);
        inner
            .attempts
            .insert(stored_attempt.reference.clone(), stored_attempt.clone());
        let subscription = inner.subscriptions.get_mut(&id).unwrap();
        apply_update(subscription, update);

        Ok(PaymentOutcomeCommit::Applied {
            subscription: subscription.clone(),
            attempt: stored_attempt,
        })
    }
}

#[async_trait]
impl PaymentAttemptRepo for InMemoryBillingStore {
    async fn get_by_reference(&self, reference: &str) -> AppResult<Option<PaymentAttempt>> {
        Ok(self.inner.lock().unwrap().attempts.get(reference).cloned())
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<PaymentAttempt>> {
        let mut attempts: Vec<PaymentAttempt> = self
            .inner
            .lock()
            .unwrap()
            .attempts
            .values()
            .filter(|a| a.subscription_id == subscription_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.processed_at);
        Ok(attempts)
    }

    async fn insert_if_absent(&self, input: &RecordAttemptInput) -> AppResult<AttemptInsert> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.attempts.get(&input.reference) {
            return Ok(AttemptInsert::Existing(existing.clone()));
        }
        let attempt = attempt_from_input(input);
        inner
            .attempts
            .insert(attempt.reference.clone(), attempt.clone());
        Ok(AttemptInsert::Inserted(attempt))
    }
}
