//! Paystack-backed implementation of the MoMo gateway port.
//!
//! Charges are raised with the `mobile_money` channel and verified through
//! the transaction-verify endpoint. The subscription id travels in the
//! charge metadata and comes back on verification, which is how callbacks
//! find their subscription without trusting webhook payload contents.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha512;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::momo_gateway::{
        ChargeInit, ChargePrompt, ChargeReference, ChargeRequest, MomoGatewayPort, VerifyOutcome,
    },
    domain::entities::subscription::Subscription,
};

pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Check the HMAC-SHA512 hex signature Paystack sends with every webhook.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha512>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[derive(Clone)]
pub struct PaystackClient {
    client: Client,
    base_url: String,
    secret_key: SecretString,
}

impl PaystackClient {
    pub fn new(
        base_url: String,
        secret_key: SecretString,
        timeout_secs: u64,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            secret_key,
        })
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key.expose_secret())
    }

    fn map_request_error(e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::GatewayTimeout
        } else {
            AppError::GatewayUnavailable
        }
    }

    async fn error_message(response: reqwest::Response) -> String {
        response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| "gateway rejected the request".to_string())
    }
}

fn parse_charge_init(data: &serde_json::Value) -> AppResult<ChargeInit> {
    let reference = data["reference"]
        .as_str()
        .ok_or_else(|| AppError::Internal("Charge response missing reference".into()))?;

    let prompt = if let Some(url) = data["authorization_url"].as_str() {
        ChargePrompt::Redirect {
            url: url.to_string(),
        }
    } else {
        ChargePrompt::MobilePrompt {
            display_text: data["display_text"]
                .as_str()
                .unwrap_or("Approve the payment prompt on your phone")
                .to_string(),
        }
    };

    Ok(ChargeInit {
        reference: ChargeReference::new(reference),
        prompt,
    })
}

fn parse_verify_outcome(body: serde_json::Value) -> VerifyOutcome {
    let data = &body["data"];
    let verified = data["status"].as_str() == Some("success");
    let amount_confirmed = data["amount"].as_i64();
    let gateway_code = data["gateway_response"]
        .as_str()
        .or(data["status"].as_str())
        .map(str::to_string);
    let subscription_id = data["metadata"]["subscription_id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok());

    VerifyOutcome {
        verified,
        amount_confirmed,
        gateway_code,
        subscription_id,
        raw: body,
    }
}

#[async_trait]
impl MomoGatewayPort for PaystackClient {
    async fn initiate_charge(&self, request: &ChargeRequest) -> AppResult<ChargeInit> {
        let payload = serde_json::json!({
            // The gateway requires an email per charge; subscribers are
            // phone-identified, so a synthetic address is derived instead.
            "email": format!("{}@subscribers.momo.local", request.user_id.simple()),
            "amount": request.amount_pesewas,
            "currency": request.currency,
            "mobile_money": {
                "phone": request.phone,
                "provider": request.network.gateway_code(),
            },
            "metadata": {
                "subscription_id": request.subscription_id.to_string(),
                "user_id": request.user_id.to_string(),
                "tier": request.tier,
            },
        });

        let response = self
            .client
            .post(format!("{}/charge", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&payload)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        match response.status() {
            s if s.is_success() => {
                let body: serde_json::Value = response.json().await.map_err(|e| {
                    AppError::Internal(format!("Unparseable charge response: {e}"))
                })?;
                parse_charge_init(&body["data"])
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Err(
                AppError::InvalidPhoneOrNetwork(Self::error_message(response).await),
            ),
            s if s.is_server_error() => Err(AppError::GatewayUnavailable),
            s => Err(AppError::Internal(format!(
                "Unexpected gateway status {s} on charge"
            ))),
        }
    }

    async fn verify(&self, reference: &ChargeReference) -> AppResult<VerifyOutcome> {
        let response = self
            .client
            .get(format!(
                "{}/transaction/verify/{}",
                self.base_url,
                reference.as_str()
            ))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(Self::map_request_error)?;

        match response.status() {
            s if s.is_success() => {
                let body: serde_json::Value = response.json().await.map_err(|e| {
                    AppError::Internal(format!("Unparseable verify response: {e}"))
                })?;
                Ok(parse_verify_outcome(body))
            }
            StatusCode::NOT_FOUND => Err(AppError::ReferenceNotFound),
            s if s.is_server_error() => Err(AppError::GatewayUnavailable),
            s => Err(AppError::Internal(format!(
                "Unexpected gateway status {s} on verify"
            ))),
        }
    }

    async fn cancel_mandate(&self, subscription: &Subscription) -> AppResult<bool> {
        // Charges here are payer-approved per cycle; there is no standing
        // mandate at the gateway to tear down. Local cancellation is the
        // whole operation.
        tracing::debug!(
            subscription_id = %subscription.id,
            "No gateway mandate to cancel for per-cycle charges"
        );
        Ok(true)
    }
}
