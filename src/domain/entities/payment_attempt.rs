use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attempt_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }
}

/// One row per gateway reference ever reconciled. Append-only; the UNIQUE
/// constraint on `reference` is what makes duplicate callbacks no-ops.
#[derive(Debug, Clone)]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub reference: String,
    pub subscription_id: Uuid,
    pub status: AttemptStatus,
    pub gateway_code: Option<String>,
    pub raw_metadata: serde_json::Value,
    pub processed_at: DateTime<Utc>,
}
