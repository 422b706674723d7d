//! Billing routes: subscription checkout, cancellation, status polls,
//! client-initiated verification, and the attempt audit trail.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::ports::momo_gateway::{ChargePrompt, ChargeReference},
    application::use_cases::subscription_lifecycle::{CreateSubscriptionRequest, CreatedSubscription},
    domain::entities::{
        momo_network::MomoNetwork,
        payment_attempt::PaymentAttempt,
        subscription::{BillingPeriod, Subscription, SubscriptionStatus},
    },
};

// ============================================================================
// Types
// ============================================================================

#[derive(Serialize)]
struct SubscriptionResponse {
    id: Uuid,
    user_id: Uuid,
    tier: String,
    network: MomoNetwork,
    amount_pesewas: i64,
    billing_period: BillingPeriod,
    status: SubscriptionStatus,
    failure_count: i32,
    last_payment_date: Option<DateTime<Utc>>,
    next_payment_date: Option<DateTime<Utc>>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            tier: s.tier,
            network: s.network,
            amount_pesewas: s.amount_pesewas,
            billing_period: s.billing_period,
            status: s.status,
            failure_count: s.failure_count,
            last_payment_date: s.last_payment_date,
            next_payment_date: s.next_payment_date,
        }
    }
}

#[derive(Serialize)]
struct CreatedSubscriptionResponse {
    subscription: SubscriptionResponse,
    reference: String,
    prompt: ChargePrompt,
}

impl From<CreatedSubscription> for CreatedSubscriptionResponse {
    fn from(created: CreatedSubscription) -> Self {
        Self {
            subscription: created.subscription.into(),
            reference: created.reference.as_str().to_string(),
            prompt: created.prompt,
        }
    }
}

#[derive(Deserialize)]
struct CancelPayload {
    user_id: Uuid,
}

#[derive(Serialize)]
struct AttemptResponse {
    id: Uuid,
    reference: String,
    status: String,
    gateway_code: Option<String>,
    processed_at: DateTime<Utc>,
}

impl From<PaymentAttempt> for AttemptResponse {
    fn from(a: PaymentAttempt) -> Self {
        Self {
            id: a.id,
            reference: a.reference,
            status: a.status.as_str().to_string(),
            gateway_code: a.gateway_code,
            processed_at: a.processed_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/billing/subscriptions
async fn create_subscription(
    State(state): State<AppState>,
    Json(payload): Json<CreateSubscriptionRequest>,
) -> AppResult<impl IntoResponse> {
    let created = state.lifecycle.create_subscription(&payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedSubscriptionResponse::from(created)),
    ))
}

/// POST /api/billing/subscriptions/{id}/cancel
async fn cancel_subscription(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelPayload>,
) -> AppResult<impl IntoResponse> {
    let cancelled = state.lifecycle.cancel(payload.user_id, id).await?;
    Ok(Json(SubscriptionResponse::from(cancelled)))
}

/// GET /api/billing/{user_id}/{tier}/status
async fn subscription_status(
    State(state): State<AppState>,
    Path((user_id, tier)): Path<(Uuid, String)>,
) -> AppResult<impl IntoResponse> {
    let check = state.status_query.check_status(user_id, &tier).await?;
    Ok(Json(check))
}

/// POST /api/billing/verify/{reference}
///
/// Client-initiated verification: same reconciliation path as the webhook,
/// for payers whose approval raced the callback.
async fn verify_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> AppResult<impl IntoResponse> {
    let result = state
        .callbacks
        .process(&ChargeReference::new(reference))
        .await?;
    Ok(Json(result))
}

/// GET /api/billing/subscriptions/{id}/attempts
async fn list_attempts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let attempts = state.status_query.list_attempts(id).await?;
    Ok(Json(
        attempts
            .into_iter()
            .map(AttemptResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", post(create_subscription))
        .route("/subscriptions/{id}/cancel", post(cancel_subscription))
        .route("/subscriptions/{id}/attempts", get(list_attempts))
        .route("/{user_id}/{tier}/status", get(subscription_status))
        .route("/verify/{reference}", post(verify_reference))
}

// ============================================================================
// Tests
// ============================================================================
