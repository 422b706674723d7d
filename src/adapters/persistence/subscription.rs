use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, payment_attempt},
    app_error::{AppError, AppResult},
    application::use_cases::subscription_lifecycle::{
        CreateSubscriptionInput, PaymentOutcomeCommit, RecordAttemptInput, SubscriptionRepo,
        SubscriptionUpdate,
    },
    domain::entities::subscription::Subscription,
};

pub(crate) fn row_to_subscription(row: &sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        user_id: row.get("user_id"),
        tier: row.get("tier"),
        phone: row.get("phone"),
        network: row.get("network"),
        amount_pesewas: row.get("amount_pesewas"),
        billing_period: row.get("billing_period"),
        status: row.get("status"),
        last_payment_date: row.get("last_payment_date"),
        next_payment_date: row.get("next_payment_date"),
        failure_count: row.get("failure_count"),
        latest_reference: row.get("latest_reference"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, user_id, tier, phone, network, amount_pesewas, billing_period, status,
    last_payment_date, next_payment_date, failure_count, latest_reference,
    version, created_at, updated_at
"#;

// Versioned update. NULL date/reference parameters keep the stored value.
const UPDATE_GUARDED_SQL: &str = r#"
    UPDATE subscriptions SET
        status = $3,
        last_payment_date = COALESCE($4, last_payment_date),
        next_payment_date = COALESCE($5, next_payment_date),
        failure_count = $6,
        latest_reference = COALESCE($7, latest_reference),
        version = version + 1,
        updated_at = NOW()
    WHERE id = $1 AND version = $2
"#;

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn get_live_by_user_and_tier(
        &self,
        user_id: Uuid,
        tier: &str,
    ) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions \
             WHERE user_id = $1 AND tier = $2 \
               AND status IN ('pending', 'active', 'overdue')",
            SELECT_COLS
        ))
        .bind(user_id)
        .bind(tier)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn get_by_latest_reference(&self, reference: &str) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE latest_reference = $1",
            SELECT_COLS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn create(&self, input: &CreateSubscriptionInput) -> AppResult<Subscription> {
        let row = sqlx::query(&format!(
            "INSERT INTO subscriptions \
                 (id, user_id, tier, phone, network, amount_pesewas, billing_period, \
                  status, failure_count, latest_reference, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', 0, $8, 1) \
             RETURNING {}",
            SELECT_COLS
        ))
        .bind(input.id)
        .bind(input.user_id)
        .bind(&input.tier)
        .bind(&input.phone)
        .bind(input.network)
        .bind(input.amount_pesewas)
        .bind(input.billing_period)
        .bind(&input.latest_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_subscription(&row))
    }

    async fn update_guarded(
        &self,
        id: Uuid,
        expected_version: i32,
        update: &SubscriptionUpdate,
    ) -> AppResult<Subscription> {
        let row = sqlx::query(&format!("{} RETURNING {}", UPDATE_GUARDED_SQL, SELECT_COLS))
            .bind(id)
            .bind(expected_version)
            .bind(update.status)
            .bind(update.last_payment_date)
            .bind(update.next_payment_date)
            .bind(update.failure_count)
            .bind(&update.latest_reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;

        match row {
            Some(row) => Ok(row_to_subscription(&row)),
            // Zero rows means the id is gone or the version moved.
            None => {
                let exists = sqlx::query("SELECT 1 FROM subscriptions WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(AppError::from)?
                    .is_some();
                if exists {
                    Err(AppError::ConcurrentUpdate)
                } else {
                    Err(AppError::SubscriptionNotFound)
                }
            }
        }
    }

    async fn commit_payment_outcome(
        &self,
        id: Uuid,
        expected_version: i32,
        update: &SubscriptionUpdate,
        attempt: &RecordAttemptInput,
    ) -> AppResult<PaymentOutcomeCommit> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // The attempt insert doubles as the idempotency check. Both it and
        // the guarded update commit or roll back together, so no interleaving
        // can apply one reference twice or record an attempt whose update
        // lost the version race.
        let inserted = sqlx::query(&format!(
            "INSERT INTO payment_attempts \
                 (id, reference, subscription_id, status, gateway_code, raw_metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (reference) DO NOTHING \
             RETURNING {}",
            payment_attempt::SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&attempt.reference)
        .bind(attempt.subscription_id)
        .bind(attempt.status)
        .bind(&attempt.gateway_code)
        .bind(&attempt.raw_metadata)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let Some(attempt_row) = inserted else {
            let existing = sqlx::query(&format!(
                "SELECT {} FROM payment_attempts WHERE reference = $1",
                payment_attempt::SELECT_COLS
            ))
            .bind(&attempt.reference)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::from)?;
            tx.rollback().await.map_err(AppError::from)?;
            return Ok(PaymentOutcomeCommit::AlreadyProcessed(
                payment_attempt::row_to_attempt(&existing),
            ));
        };

        let updated = sqlx::query(&format!("{} RETURNING {}", UPDATE_GUARDED_SQL, SELECT_COLS))
            .bind(id)
            .bind(expected_version)
            .bind(update.status)
            .bind(update.last_payment_date)
            .bind(update.next_payment_date)
            .bind(update.failure_count)
            .bind(&update.latest_reference)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::from)?;

        let Some(subscription_row) = updated else {
            tx.rollback().await.map_err(AppError::from)?;
            return Err(AppError::ConcurrentUpdate);
        };

        tx.commit().await.map_err(AppError::from)?;

        Ok(PaymentOutcomeCommit::Applied {
            subscription: row_to_subscription(&subscription_row),
            attempt: payment_attempt::row_to_attempt(&attempt_row),
        })
    }
}
