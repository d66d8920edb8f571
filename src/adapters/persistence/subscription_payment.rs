use async_trait::async_trait;
use sqlx::{PgExecutor, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription_lifecycle::{NewPayment, SubscriptionPaymentRepo},
    domain::entities::subscription_payment::SubscriptionPayment,
};

pub(crate) fn row_to_payment(row: sqlx::postgres::PgRow) -> SubscriptionPayment {
    SubscriptionPayment {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        amount: row.get("amount"),
        payment_type: row.get("payment_type"),
        payment_date: row.get("payment_date"),
        reference_number: row.get("reference_number"),
        notes: row.get("notes"),
        recorded_by: row.get("recorded_by"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, subscription_id, amount, payment_type, payment_date,
    reference_number, notes, recorded_by, created_at
"#;

/// Shared with the subscription repo so versioned writes can append their
/// payment inside the same transaction.
pub(crate) async fn insert_payment<'e, E: PgExecutor<'e>>(
    executor: E,
    subscription_id: Uuid,
    payment: &NewPayment,
) -> AppResult<sqlx::postgres::PgRow> {
    let id = Uuid::new_v4();
    sqlx::query(&format!(
        r#"
        INSERT INTO subscription_payments
            (id, subscription_id, amount, payment_type, payment_date,
             reference_number, notes, recorded_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        SELECT_COLS
    ))
    .bind(id)
    .bind(subscription_id)
    .bind(payment.amount)
    .bind(payment.payment_type)
    .bind(payment.payment_date)
    .bind(&payment.reference_number)
    .bind(&payment.notes)
    .bind(payment.recorded_by)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

#[async_trait]
impl SubscriptionPaymentRepo for PostgresPersistence {
    async fn insert(
        &self,
        subscription_id: Uuid,
        payment: &NewPayment,
    ) -> AppResult<SubscriptionPayment> {
        let row = insert_payment(&self.pool, subscription_id, payment).await?;
        Ok(row_to_payment(row))
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionPayment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_payments WHERE subscription_id = $1 ORDER BY payment_date DESC, created_at DESC",
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_payment).collect())
    }

    async fn reference_exists(
        &self,
        subscription_id: Uuid,
        reference_number: &str,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM subscription_payments WHERE subscription_id = $1 AND reference_number = $2)"
        )
        .bind(subscription_id)
        .bind(reference_number)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(exists)
    }
}
