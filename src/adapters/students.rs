use async_trait::async_trait;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::{context::TenantContext, use_cases::access::StudentDirectory},
};

/// Roster lookup against the shared students table. The billing schema does
/// not own this table; it only counts active rows for the tenant's current
/// academic session.
#[async_trait]
impl StudentDirectory for PostgresPersistence {
    async fn active_student_count(&self, ctx: TenantContext) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM students WHERE tenant_id = $1 AND academic_session_id = $2 AND active = true"
        )
        .bind(ctx.tenant_id)
        .bind(ctx.academic_session_id)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(count)
    }
}
