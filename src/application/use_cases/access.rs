use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        clock::Clock,
        context::TenantContext,
        use_cases::{
            plan_catalog::PricingPlanRepo,
            subscription_lifecycle::{NewEvent, SubscriptionChange, SubscriptionRepo},
        },
    },
    domain::entities::{
        pricing_plan::WarningLevel,
        subscription::{Subscription, SubscriptionStatus},
        subscription_event::SubscriptionEventType,
    },
};

/// Days-to-deadline thresholds for the expiry warning banner.
const EXPIRY_WARNING_DAYS: i64 = 30;
const EXPIRY_CRITICAL_DAYS: i64 = 7;

/// Read-side view into the tenant's student roster. The billing engine only
/// ever needs the count of active students in the current academic session.
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn active_student_count(&self, ctx: TenantContext) -> AppResult<i64>;
}

/// Everything a dashboard needs to render the tenant's standing: the derived
/// status, usage against the plan cap, and both warning dimensions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessStatus {
    pub subscription_id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub persisted_status: SubscriptionStatus,
    pub effective_status: SubscriptionStatus,
    pub days_to_deadline: Option<i64>,
    pub student_cap: i32,
    pub active_students: i64,
    pub usage_percent: Decimal,
    pub usage_warning: WarningLevel,
    pub expiry_warning: WarningLevel,
}

/// Evaluates whether a tenant may use the product right now, from dates alone.
/// Persisted status is advisory; the clock decides, so access answers stay
/// correct even when no write has happened since a deadline passed.
#[derive(Clone)]
pub struct AccessEvaluator {
    subscription_repo: Arc<dyn SubscriptionRepo>,
    plan_repo: Arc<dyn PricingPlanRepo>,
    students: Arc<dyn StudentDirectory>,
    clock: Arc<dyn Clock>,
}

impl AccessEvaluator {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepo>,
        plan_repo: Arc<dyn PricingPlanRepo>,
        students: Arc<dyn StudentDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            subscription_repo,
            plan_repo,
            students,
            clock,
        }
    }

    async fn current_subscription(&self, tenant_id: Uuid) -> AppResult<Subscription> {
        self.subscription_repo
            .get_current_by_tenant(tenant_id)
            .await?
            .ok_or_else(|| AppError::RuleViolation("No active/trial subscription".into()))
    }

    /// Full standing report for the tenant. Never writes. A suspended tenant
    /// (manually or because the grace window ran out) is a hard block and
    /// surfaces as an error, not a status.
    pub async fn validate_school_access(&self, ctx: TenantContext) -> AppResult<AccessStatus> {
        let sub = self.current_subscription(ctx.tenant_id).await?;
        let plan = self
            .plan_repo
            .get_by_id(sub.plan_id)
            .await?
            .ok_or_else(|| AppError::Internal("Subscription references a missing plan".into()))?;

        let today = self.clock.today();
        let effective = sub.effective_status(today);
        if effective == SubscriptionStatus::Suspended {
            return Err(AppError::RuleViolation("Subscription suspended".into()));
        }

        let active_students = self.students.active_student_count(ctx).await?;

        let usage_percent = usage_percent(active_students, plan.student_cap);
        let usage_warning = if usage_percent >= Decimal::from(plan.usage_critical_percent) {
            WarningLevel::Critical
        } else if usage_percent >= Decimal::from(plan.usage_warning_percent) {
            WarningLevel::Warning
        } else {
            WarningLevel::None
        };

        let days_to_deadline = sub.days_to_deadline(today);
        let expiry_warning = match days_to_deadline {
            Some(days) if days < 0 => WarningLevel::Critical,
            Some(days) if days <= EXPIRY_CRITICAL_DAYS => WarningLevel::Critical,
            Some(days) if days <= EXPIRY_WARNING_DAYS => WarningLevel::Warning,
            _ => WarningLevel::None,
        };

        Ok(AccessStatus {
            subscription_id: sub.id,
            plan_id: plan.id,
            plan_name: plan.name,
            persisted_status: sub.status,
            effective_status: effective,
            days_to_deadline,
            student_cap: plan.student_cap,
            active_students,
            usage_percent,
            usage_warning,
            expiry_warning,
        })
    }

    /// Gate in front of student enrollment: the general access check first,
    /// then strictly under the plan cap. At exactly 100% the next enrollment
    /// is refused even though everything else keeps working.
    pub async fn validate_student_creation_allowed(&self, ctx: TenantContext) -> AppResult<()> {
        let status = self.validate_school_access(ctx).await?;
        if status.active_students >= i64::from(status.student_cap) {
            return Err(AppError::RuleViolation(format!(
                "Student cap reached ({}/{}); upgrade the plan to enroll more students",
                status.active_students, status.student_cap
            )));
        }
        Ok(())
    }

    /// Fold the derived status back into the row, with an audit event. Called
    /// from the admin sync endpoint; a no-op when nothing drifted.
    pub async fn persist_effective_status(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
    ) -> AppResult<Subscription> {
        let sub = self.current_subscription(tenant_id).await?;
        let effective = sub.effective_status(self.clock.today());
        if effective == sub.status {
            return Ok(sub);
        }

        let mut change = SubscriptionChange::keeping(&sub);
        change.status = effective;

        let event = NewEvent {
            event_type: SubscriptionEventType::StatusSynced,
            days_added: None,
            previous_expiry_date: sub.expiry_date,
            new_expiry_date: sub.expiry_date,
            previous_status: Some(sub.status),
            new_status: Some(effective),
            reason: None,
            performed_by: actor_id,
        };
        let (sub, _) = self
            .subscription_repo
            .apply_change(sub.id, sub.version, &change, None, &event)
            .await?;
        Ok(sub)
    }
}

/// Roster usage as a percentage of the plan cap, two decimals, half-up.
pub fn usage_percent(active_students: i64, student_cap: i32) -> Decimal {
    if student_cap <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(active_students) * Decimal::from(100) / Decimal::from(student_cap))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
