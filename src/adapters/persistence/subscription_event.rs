use async_trait::async_trait;
use sqlx::{PgExecutor, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription_lifecycle::{NewEvent, SubscriptionEventRepo},
    domain::entities::subscription_event::SubscriptionEvent,
};

fn row_to_event(row: sqlx::postgres::PgRow) -> SubscriptionEvent {
    SubscriptionEvent {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        event_type: row.get("event_type"),
        days_added: row.get("days_added"),
        previous_expiry_date: row.get("previous_expiry_date"),
        new_expiry_date: row.get("new_expiry_date"),
        previous_status: row.get("previous_status"),
        new_status: row.get("new_status"),
        reason: row.get("reason"),
        performed_by: row.get("performed_by"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, subscription_id, event_type, days_added, previous_expiry_date,
    new_expiry_date, previous_status, new_status, reason, performed_by, created_at
"#;

/// Shared with the subscription repo; every versioned write records its event
/// in the same transaction.
pub(crate) async fn insert_event<'e, E: PgExecutor<'e>>(
    executor: E,
    subscription_id: Uuid,
    event: &NewEvent,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO subscription_events
            (id, subscription_id, event_type, days_added, previous_expiry_date,
             new_expiry_date, previous_status, new_status, reason, performed_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(id)
    .bind(subscription_id)
    .bind(event.event_type)
    .bind(event.days_added)
    .bind(event.previous_expiry_date)
    .bind(event.new_expiry_date)
    .bind(event.previous_status)
    .bind(event.new_status)
    .bind(&event.reason)
    .bind(event.performed_by)
    .execute(executor)
    .await
    .map_err(AppError::from)?;
    Ok(())
}

#[async_trait]
impl SubscriptionEventRepo for PostgresPersistence {
    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_events WHERE subscription_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_event).collect())
    }
}
