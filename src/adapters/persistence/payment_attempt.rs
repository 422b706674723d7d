use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription_lifecycle::{
        AttemptInsert, PaymentAttemptRepo, RecordAttemptInput,
    },
    domain::entities::payment_attempt::PaymentAttempt,
};

pub(crate) fn row_to_attempt(row: &sqlx::postgres::PgRow) -> PaymentAttempt {
    PaymentAttempt {
        id: row.get("id"),
        reference: row.get("reference"),
        subscription_id: row.get("subscription_id"),
        status: row.get("status"),
        gateway_code: row.get("gateway_code"),
        raw_metadata: row.get("raw_metadata"),
        processed_at: row.get("processed_at"),
    }
}

pub(crate) const SELECT_COLS: &str = r#"
    id, reference, subscription_id, status, gateway_code, raw_metadata, processed_at
"#;

#[async_trait]
impl PaymentAttemptRepo for PostgresPersistence {
    async fn get_by_reference(&self, reference: &str) -> AppResult<Option<PaymentAttempt>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_attempts WHERE reference = $1",
            SELECT_COLS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_attempt))
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<PaymentAttempt>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payment_attempts \
             WHERE subscription_id = $1 ORDER BY processed_at ASC",
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_attempt).collect())
    }

    async fn insert_if_absent(&self, input: &RecordAttemptInput) -> AppResult<AttemptInsert> {
        let inserted = sqlx::query(&format!(
            "INSERT INTO payment_attempts \
                 (id, reference, subscription_id, status, gateway_code, raw_metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (reference) DO NOTHING \
             RETURNING {}",
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.reference)
        .bind(input.subscription_id)
        .bind(input.status)
        .bind(&input.gateway_code)
        .bind(&input.raw_metadata)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        if let Some(row) = inserted {
            return Ok(AttemptInsert::Inserted(row_to_attempt(&row)));
        }

        let existing = sqlx::query(&format!(
            "SELECT {} FROM payment_attempts WHERE reference = $1",
            SELECT_COLS
        ))
        .bind(&input.reference)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(AttemptInsert::Existing(row_to_attempt(&existing)))
    }
}
