//! Gateway webhook handler.
//!
//! Deliveries are at-least-once and unordered; the reconciliation core is
//! idempotent on the reference, so this layer only authenticates the payload
//! and decides which failures are worth a gateway redelivery.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppError,
    application::ports::momo_gateway::ChargeReference,
    infra::paystack_client::{PAYSTACK_SIGNATURE_HEADER, verify_webhook_signature},
};

#[derive(Deserialize)]
struct WebhookEnvelope {
    event: String,
    data: WebhookData,
}

#[derive(Deserialize)]
struct WebhookData {
    reference: String,
}

/// Determines if a webhook processing error should trigger a gateway retry.
///
/// Returns `true` for transient errors, meaning we answer 5xx so the gateway
/// redelivers. Expected conditions get 2xx and a log line; redelivering them
/// would change nothing.
fn is_retryable_error(error: &AppError) -> bool {
    match error {
        // Transient - retry may succeed
        AppError::Database(_) => true,
        AppError::Internal(_) => true,
        AppError::TemporarilyUnavailable => true,
        AppError::GatewayUnavailable => true,
        AppError::GatewayTimeout => true,
        AppError::ConcurrentUpdate => true,

        // Expected conditions - won't change with retry
        AppError::ReferenceNotFound => false,
        AppError::SubscriptionNotFound => false,
        AppError::NotFound => false,
        AppError::InvalidInput(_) => false,
        AppError::InvalidPhoneOrNetwork(_) => false,
    }
}

/// POST /api/webhooks/momo
async fn handle_momo_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let Some(signature) = headers
        .get(PAYSTACK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        debug!("Webhook rejected: missing signature header");
        return StatusCode::UNAUTHORIZED;
    };

    if !verify_webhook_signature(
        state.config.gateway_secret_key.expose_secret(),
        body.as_bytes(),
        signature,
    ) {
        debug!("Webhook rejected: signature mismatch");
        return StatusCode::UNAUTHORIZED;
    }

    let envelope: WebhookEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(error = %e, "Webhook rejected: unparseable payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    // Only charge events carry a reference we reconcile. Everything else
    // (transfers, disputes) is acknowledged and dropped.
    if !envelope.event.starts_with("charge.") {
        debug!(event = %envelope.event, "Ignoring non-charge webhook event");
        return StatusCode::OK;
    }

    let reference = ChargeReference::new(envelope.data.reference);
    match state.callbacks.process(&reference).await {
        Ok(result) => {
            info!(
                event = %envelope.event,
                reference = %reference,
                subscription_status = result.subscription_status.as_str(),
                replayed = result.replayed,
                "Webhook reconciled"
            );
            StatusCode::OK
        }
        Err(e) if is_retryable_error(&e) => {
            error!(
                event = %envelope.event,
                reference = %reference,
                error = %e,
                retryable = true,
                "Webhook processing failed, returning 500 for gateway retry"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(e) => {
            error!(
                event = %envelope.event,
                reference = %reference,
                error = %e,
                retryable = false,
                "Webhook processing failed on an expected condition, acknowledging"
            );
            StatusCode::OK
        }
    }
}

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/momo", post(handle_momo_webhook))
}

// ============================================================================
// Tests
// ============================================================================
