use async_trait::async_trait;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    adapters::persistence::{
        PostgresPersistence,
        subscription_event::insert_event,
        subscription_payment::{insert_payment, row_to_payment},
    },
    app_error::{AppError, AppResult},
    application::use_cases::subscription_lifecycle::{
        CreateSubscriptionInput, NewEvent, NewPayment, SubscriptionChange, SubscriptionRepo,
    },
    domain::entities::{subscription::Subscription, subscription_payment::SubscriptionPayment},
};

fn row_to_subscription(row: sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        plan_id: row.get("plan_id"),
        status: row.get("status"),
        start_date: row.get("start_date"),
        trial_end_date: row.get("trial_end_date"),
        expiry_date: row.get("expiry_date"),
        grace_period_days: row.get("grace_period_days"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, tenant_id, plan_id, status, start_date, trial_end_date,
    expiry_date, grace_period_days, version, created_at, updated_at
"#;

async fn payment_within(
    tx: &mut Transaction<'_, Postgres>,
    subscription_id: Uuid,
    payment: &NewPayment,
) -> AppResult<SubscriptionPayment> {
    let row = insert_payment(&mut **tx, subscription_id, payment).await?;
    Ok(row_to_payment(row))
}

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
        Ok(row.map(row_to_subscription))
    }

    async fn get_current_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_COLS
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_subscription))
    }

    async fn create(
        &self,
        input: &CreateSubscriptionInput,
        event: &NewEvent,
    ) -> AppResult<Subscription> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions
                (id, tenant_id, plan_id, status, start_date, trial_end_date,
                 expiry_date, grace_period_days, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(input.tenant_id)
        .bind(input.plan_id)
        .bind(input.status)
        .bind(input.start_date)
        .bind(input.trial_end_date)
        .bind(input.expiry_date)
        .bind(input.grace_period_days)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        insert_event(&mut *tx, id, event).await?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_subscription(row))
    }

    async fn apply_change(
        &self,
        id: Uuid,
        expected_version: i64,
        change: &SubscriptionChange,
        payment: Option<&NewPayment>,
        event: &NewEvent,
    ) -> AppResult<(Subscription, Option<SubscriptionPayment>)> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // Conditional write: only the caller who still holds the current
        // version gets to move the row.
        let row = sqlx::query(&format!(
            r#"
            UPDATE subscriptions SET
                plan_id = $3,
                status = $4,
                start_date = $5,
                trial_end_date = $6,
                expiry_date = $7,
                grace_period_days = $8,
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND version = $2
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(expected_version)
        .bind(change.plan_id)
        .bind(change.status)
        .bind(change.start_date)
        .bind(change.trial_end_date)
        .bind(change.expiry_date)
        .bind(change.grace_period_days)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(AppError::from)?;
            // Distinguish a stale version from a deleted row.
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM subscriptions WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(AppError::from)?;
            return Err(if exists {
                AppError::ConcurrencyConflict
            } else {
                AppError::NotFound
            });
        };

        let persisted_payment = match payment {
            Some(p) => Some(payment_within(&mut tx, id, p).await?),
            None => None,
        };
        insert_event(&mut *tx, id, event).await?;

        tx.commit().await.map_err(AppError::from)?;
        Ok((row_to_subscription(row), persisted_payment))
    }
}
