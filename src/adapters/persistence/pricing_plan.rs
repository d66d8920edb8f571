use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::plan_catalog::{CreatePlanInput, PricingPlanRepo, UpdatePlanInput},
    domain::entities::pricing_plan::PricingPlan,
};

fn row_to_plan(row: sqlx::postgres::PgRow) -> PricingPlan {
    PricingPlan {
        id: row.get("id"),
        name: row.get("name"),
        yearly_price: row.get("yearly_price"),
        student_cap: row.get("student_cap"),
        default_trial_days: row.get("default_trial_days"),
        default_grace_period_days: row.get("default_grace_period_days"),
        usage_warning_percent: row.get("usage_warning_percent"),
        usage_critical_percent: row.get("usage_critical_percent"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, name, yearly_price, student_cap, default_trial_days,
    default_grace_period_days, usage_warning_percent, usage_critical_percent,
    active, created_at, updated_at
"#;

#[async_trait]
impl PricingPlanRepo for PostgresPersistence {
    async fn create(&self, input: &CreatePlanInput) -> AppResult<PricingPlan> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO pricing_plans
                (id, name, yearly_price, student_cap, default_trial_days,
                 default_grace_period_days, usage_warning_percent, usage_critical_percent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.yearly_price)
        .bind(input.student_cap)
        .bind(input.default_trial_days)
        .bind(input.default_grace_period_days)
        .bind(input.usage_warning_percent)
        .bind(input.usage_critical_percent)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_plan(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PricingPlan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pricing_plans WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_plan))
    }

    async fn get_by_name(&self, name: &str) -> AppResult<Option<PricingPlan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pricing_plans WHERE LOWER(name) = LOWER($1)",
            SELECT_COLS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_plan))
    }

    async fn list(&self, include_inactive: bool) -> AppResult<Vec<PricingPlan>> {
        let query = if include_inactive {
            format!(
                "SELECT {} FROM pricing_plans ORDER BY yearly_price, created_at",
                SELECT_COLS
            )
        } else {
            format!(
                "SELECT {} FROM pricing_plans WHERE active = true ORDER BY yearly_price, created_at",
                SELECT_COLS
            )
        };
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_plan).collect())
    }

    async fn update(&self, id: Uuid, input: &UpdatePlanInput) -> AppResult<PricingPlan> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE pricing_plans SET
                name = COALESCE($2, name),
                yearly_price = COALESCE($3, yearly_price),
                student_cap = COALESCE($4, student_cap),
                default_trial_days = COALESCE($5, default_trial_days),
                default_grace_period_days = COALESCE($6, default_grace_period_days),
                usage_warning_percent = COALESCE($7, usage_warning_percent),
                usage_critical_percent = COALESCE($8, usage_critical_percent),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.yearly_price)
        .bind(input.student_cap)
        .bind(input.default_trial_days)
        .bind(input.default_grace_period_days)
        .bind(input.usage_warning_percent)
        .bind(input.usage_critical_percent)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_plan(row))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> AppResult<()> {
        sqlx::query(
            "UPDATE pricing_plans SET active = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(id)
        .bind(active)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM pricing_plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn count_live_subscriptions(&self, plan_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscriptions WHERE plan_id = $1 AND status IN ('trial', 'active', 'past_due')"
        )
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(count)
    }
}
