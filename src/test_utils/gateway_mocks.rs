//! Mock gateway and notifier for exercising the payment flows offline.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        billing_notifier::{BillingEvent, BillingNotifier},
        momo_gateway::{
            ChargeInit, ChargePrompt, ChargeReference, ChargeRequest, MomoGatewayPort,
            VerifyOutcome,
        },
    },
    domain::entities::subscription::Subscription,
};

/// A successful verification for the given subscription.
pub fn success_outcome(subscription_id: Uuid) -> VerifyOutcome {
    VerifyOutcome {
        verified: true,
        amount_confirmed: Some(500),
        gateway_code: Some("success".to_string()),
        subscription_id: Some(subscription_id),
        raw: serde_json::json!({"status": "success"}),
    }
}

/// A failed verification carrying the given gateway decline code.
pub fn failure_outcome(subscription_id: Uuid, code: &str) -> VerifyOutcome {
    VerifyOutcome {
        verified: false,
        amount_confirmed: None,
        gateway_code: Some(code.to_string()),
        subscription_id: Some(subscription_id),
        raw: serde_json::json!({"status": "failed", "gateway_response": code}),
    }
}

// AppError holds no shared state, but it does not derive Clone; scripted
// errors are re-materialized variant by variant so one script can answer
// any number of concurrent calls.
fn clone_app_error(error: &AppError) -> AppError {
    match error {
        AppError::Database(m) => AppError::Database(m.clone()),
        AppError::GatewayUnavailable => AppError::GatewayUnavailable,
        AppError::GatewayTimeout => AppError::GatewayTimeout,
        AppError::InvalidPhoneOrNetwork(m) => AppError::InvalidPhoneOrNetwork(m.clone()),
        AppError::SubscriptionNotFound => AppError::SubscriptionNotFound,
        AppError::ReferenceNotFound => AppError::ReferenceNotFound,
        AppError::ConcurrentUpdate => AppError::ConcurrentUpdate,
        AppError::TemporarilyUnavailable => AppError::TemporarilyUnavailable,
        AppError::InvalidInput(m) => AppError::InvalidInput(m.clone()),
        AppError::NotFound => AppError::NotFound,
        AppError::Internal(m) => AppError::Internal(m.clone()),
    }
}

#[derive(Default)]
struct GatewayInner {
    scripted_verifies: HashMap<String, AppResult<VerifyOutcome>>,
    next_initiate_error: Option<AppError>,
    fail_cancel_mandate: bool,
    initiated: usize,
    verified: usize,
    mandates_cancelled: usize,
}

/// Scriptable gateway double. Unscripted verifies fail loudly so a test
/// cannot silently pass on a reference it never set up.
#[derive(Default)]
pub struct MockMomoGateway {
    inner: Mutex<GatewayInner>,
}

impl MockMomoGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_verify(&self, reference: &str, result: AppResult<VerifyOutcome>) {
        self.inner
            .lock()
            .unwrap()
            .scripted_verifies
            .insert(reference.to_string(), result);
    }

    pub fn fail_next_initiate(&self, error: AppError) {
        self.inner.lock().unwrap().next_initiate_error = Some(error);
    }

    pub fn fail_cancel_mandate(&self) {
        self.inner.lock().unwrap().fail_cancel_mandate = true;
    }

    pub fn initiated_count(&self) -> usize {
        self.inner.lock().unwrap().initiated
    }

    pub fn verify_count(&self) -> usize {
        self.inner.lock().unwrap().verified
    }

    pub fn cancel_mandate_count(&self) -> usize {
        self.inner.lock().unwrap().mandates_cancelled
    }
}

#[async_trait]
impl MomoGatewayPort for MockMomoGateway {
    async fn initiate_charge(&self, request: &ChargeRequest) -> AppResult<ChargeInit> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.next_initiate_error.take() {
            return Err(error);
        }
        inner.initiated += 1;
        Ok(ChargeInit {
            reference: ChargeReference::new(format!(
                "MOCK-{}-{}",
                request.subscription_id.simple(),
                inner.initiated
            )),
            prompt: ChargePrompt::MobilePrompt {
                display_text: "Approve the payment on your phone".to_string(),
            },
        })
    }

    async fn verify(&self, reference: &ChargeReference) -> AppResult<VerifyOutcome> {
        let mut inner = self.inner.lock().unwrap();
        inner.verified += 1;
        match inner.scripted_verifies.get(reference.as_str()) {
            Some(Ok(outcome)) => Ok(outcome.clone()),
            Some(Err(error)) => Err(clone_app_error(error)),
            None => Err(AppError::Internal(format!(
                "no scripted verify outcome for reference {reference}"
            ))),
        }
    }

    async fn cancel_mandate(&self, _subscription: &Subscription) -> AppResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.mandates_cancelled += 1;
        if inner.fail_cancel_mandate {
            return Err(AppError::GatewayUnavailable);
        }
        Ok(true)
    }
}

/// Notifier that records every event it is handed.
#[derive(Default)]
pub struct CollectingNotifier {
    events: Mutex<Vec<BillingEvent>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BillingEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl BillingNotifier for CollectingNotifier {
    async fn notify(&self, event: BillingEvent) -> AppResult<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}
