use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::{momo_network::MomoNetwork, subscription::Subscription},
};

/// Gateway-assigned identifier for a single charge. This is the idempotency
/// key of the whole reconciliation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChargeReference(pub String);

impl ChargeReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChargeReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the gateway needs to raise a MoMo charge.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub tier: String,
    pub phone: String,
    pub network: MomoNetwork,
    pub amount_pesewas: i64,
    pub currency: String,
}

/// How the payer completes the charge after initiation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ChargePrompt {
    /// Payer must follow a hosted page (card fallback, OTP collection).
    Redirect { url: String },
    /// Payer approves an authorization prompt pushed to their handset.
    MobilePrompt { display_text: String },
}

/// Result of initiating a charge against the gateway.
#[derive(Debug, Clone)]
pub struct ChargeInit {
    pub reference: ChargeReference,
    pub prompt: ChargePrompt,
}

/// Result of verifying a reference against the gateway.
///
/// `subscription_id` round-trips from the metadata set at charge time and is
/// the primary way a callback resolves its owning subscription.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub verified: bool,
    pub amount_confirmed: Option<i64>,
    pub gateway_code: Option<String>,
    pub subscription_id: Option<Uuid>,
    pub raw: serde_json::Value,
}

/// Payment gateway port. Implementations map these domain-level actions to
/// the provider's API and must carry a bounded request timeout.
#[async_trait]
pub trait MomoGatewayPort: Send + Sync {
    /// Raise a charge. Fails with `GatewayUnavailable` or
    /// `InvalidPhoneOrNetwork`; never mutates local state.
    async fn initiate_charge(&self, request: &ChargeRequest) -> AppResult<ChargeInit>;

    /// Verify a reference. Safe to call repeatedly for the same reference
    /// (gateway-side idempotent). Fails with `ReferenceNotFound` or
    /// `GatewayTimeout`.
    async fn verify(&self, reference: &ChargeReference) -> AppResult<VerifyOutcome>;

    /// Tear down the recurring mandate. Best-effort: a `false` return or an
    /// error must not block local cancellation.
    async fn cancel_mandate(&self, subscription: &Subscription) -> AppResult<bool>;
}
