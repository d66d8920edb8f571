use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::pricing_plan::PricingPlan,
};

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanInput {
    pub name: String,
    pub yearly_price: Decimal,
    pub student_cap: i32,
    pub default_trial_days: i32,
    pub default_grace_period_days: i32,
    pub usage_warning_percent: i32,
    pub usage_critical_percent: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlanInput {
    pub name: Option<String>,
    pub yearly_price: Option<Decimal>,
    pub student_cap: Option<i32>,
    pub default_trial_days: Option<i32>,
    pub default_grace_period_days: Option<i32>,
    pub usage_warning_percent: Option<i32>,
    pub usage_critical_percent: Option<i32>,
}

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait PricingPlanRepo: Send + Sync {
    async fn create(&self, input: &CreatePlanInput) -> AppResult<PricingPlan>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PricingPlan>>;
    /// Case-insensitive name lookup, used for the uniqueness rule.
    async fn get_by_name(&self, name: &str) -> AppResult<Option<PricingPlan>>;
    async fn list(&self, include_inactive: bool) -> AppResult<Vec<PricingPlan>>;
    async fn update(&self, id: Uuid, input: &UpdatePlanInput) -> AppResult<PricingPlan>;
    async fn set_active(&self, id: Uuid, active: bool) -> AppResult<()>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    /// Count of subscriptions referencing the plan with status trial,
    /// active or past_due.
    async fn count_live_subscriptions(&self, plan_id: Uuid) -> AppResult<i64>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct PlanCatalog {
    plan_repo: Arc<dyn PricingPlanRepo>,
}

impl PlanCatalog {
    pub fn new(plan_repo: Arc<dyn PricingPlanRepo>) -> Self {
        Self { plan_repo }
    }

    pub async fn create_plan(&self, input: CreatePlanInput) -> AppResult<PricingPlan> {
        validate_plan_fields(
            &input.name,
            input.yearly_price,
            input.student_cap,
            input.default_trial_days,
            input.default_grace_period_days,
            input.usage_warning_percent,
            input.usage_critical_percent,
        )?;

        if self.plan_repo.get_by_name(&input.name).await?.is_some() {
            return Err(AppError::RuleViolation(format!(
                "A plan named '{}' already exists",
                input.name
            )));
        }

        self.plan_repo.create(&input).await
    }

    pub async fn get_plan(&self, id: Uuid) -> AppResult<PricingPlan> {
        self.plan_repo
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn list_plans(&self, include_inactive: bool) -> AppResult<Vec<PricingPlan>> {
        self.plan_repo.list(include_inactive).await
    }

    pub async fn update_plan(&self, id: Uuid, input: UpdatePlanInput) -> AppResult<PricingPlan> {
        let current = self.get_plan(id).await?;

        let merged_name = input.name.as_deref().unwrap_or(&current.name);
        validate_plan_fields(
            merged_name,
            input.yearly_price.unwrap_or(current.yearly_price),
            input.student_cap.unwrap_or(current.student_cap),
            input.default_trial_days.unwrap_or(current.default_trial_days),
            input
                .default_grace_period_days
                .unwrap_or(current.default_grace_period_days),
            input
                .usage_warning_percent
                .unwrap_or(current.usage_warning_percent),
            input
                .usage_critical_percent
                .unwrap_or(current.usage_critical_percent),
        )?;

        if let Some(new_name) = &input.name {
            if let Some(other) = self.plan_repo.get_by_name(new_name).await? {
                if other.id != id {
                    return Err(AppError::RuleViolation(format!(
                        "A plan named '{}' already exists",
                        new_name
                    )));
                }
            }
        }

        self.plan_repo.update(id, &input).await
    }

    /// Retire a plan from sale. Blocked while any live subscription still
    /// references it; suspended and historical references do not block.
    pub async fn deactivate_plan(&self, id: Uuid) -> AppResult<()> {
        self.get_plan(id).await?;
        self.ensure_no_live_subscribers(id).await?;
        self.plan_repo.set_active(id, false).await
    }

    pub async fn delete_plan(&self, id: Uuid) -> AppResult<()> {
        self.get_plan(id).await?;
        self.ensure_no_live_subscribers(id).await?;
        self.plan_repo.delete(id).await
    }

    async fn ensure_no_live_subscribers(&self, plan_id: Uuid) -> AppResult<()> {
        let live = self.plan_repo.count_live_subscriptions(plan_id).await?;
        if live > 0 {
            return Err(AppError::RuleViolation(format!(
                "Plan has {live} live subscription(s); it cannot be retired"
            )));
        }
        Ok(())
    }
}

fn validate_plan_fields(
    name: &str,
    yearly_price: Decimal,
    student_cap: i32,
    default_trial_days: i32,
    default_grace_period_days: i32,
    usage_warning_percent: i32,
    usage_critical_percent: i32,
) -> AppResult<()> {
    if name.trim().is_empty() || name.len() > 100 {
        return Err(AppError::InvalidInput(
            "Plan name must be 1-100 characters".into(),
        ));
    }
    if yearly_price < Decimal::ZERO {
        return Err(AppError::InvalidInput(
            "Yearly price cannot be negative".into(),
        ));
    }
    if student_cap < 1 {
        return Err(AppError::InvalidInput(
            "Student cap must be at least 1".into(),
        ));
    }
    if !(1..=365).contains(&default_trial_days) {
        return Err(AppError::InvalidInput(
            "Default trial days must be within 1-365".into(),
        ));
    }
    if default_grace_period_days < 0 {
        return Err(AppError::InvalidInput(
            "Grace period days cannot be negative".into(),
        ));
    }
    for pct in [usage_warning_percent, usage_critical_percent] {
        if !(0..=100).contains(&pct) {
            return Err(AppError::InvalidInput(
                "Usage thresholds must be within 0-100".into(),
            ));
        }
    }
    if usage_warning_percent > usage_critical_percent {
        return Err(AppError::InvalidInput(
            "Usage warning threshold cannot exceed the critical threshold".into(),
        ));
    }
    Ok(())
}
