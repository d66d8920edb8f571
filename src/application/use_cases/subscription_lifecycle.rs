use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{clock::Clock, context::TenantContext, use_cases::plan_catalog::PricingPlanRepo},
    domain::entities::{
        pricing_plan::PricingPlan,
        subscription::{Subscription, SubscriptionStatus},
        subscription_event::{SubscriptionEvent, SubscriptionEventType},
        subscription_payment::{PaymentType, SubscriptionPayment},
    },
};

/// First activation always buys a flat 365-day term, leap years ignored.
pub const SUBSCRIPTION_TERM_DAYS: i64 = 365;

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateSubscriptionInput {
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub trial_end_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub grace_period_days: i32,
}

/// The full replacement field set for a versioned subscription write. The
/// repository persists these only if the row's version still matches the one
/// the caller read.
#[derive(Debug, Clone)]
pub struct SubscriptionChange {
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub trial_end_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub grace_period_days: i32,
}

impl SubscriptionChange {
    /// A change that keeps every field as currently persisted. Callers then
    /// override the fields their operation touches.
    pub fn keeping(sub: &Subscription) -> Self {
        Self {
            plan_id: sub.plan_id,
            status: sub.status,
            start_date: sub.start_date,
            trial_end_date: sub.trial_end_date,
            expiry_date: sub.expiry_date,
            grace_period_days: sub.grace_period_days,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub payment_date: NaiveDate,
    pub reference_number: String,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: SubscriptionEventType,
    pub days_added: Option<i32>,
    pub previous_expiry_date: Option<NaiveDate>,
    pub new_expiry_date: Option<NaiveDate>,
    pub previous_status: Option<SubscriptionStatus>,
    pub new_status: Option<SubscriptionStatus>,
    pub reason: Option<String>,
    pub performed_by: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivateInput {
    pub payment_date: NaiveDate,
    pub reference_number: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub payment_date: NaiveDate,
    pub reference_number: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpgradeOutcome {
    pub subscription: Subscription,
    pub proration_payment: SubscriptionPayment,
    pub prorated_amount: Decimal,
}

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>>;
    /// The tenant's current subscription row (newest, the one the lifecycle
    /// operates on).
    async fn get_current_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<Subscription>>;
    /// Insert a new subscription together with its audit event, atomically.
    async fn create(
        &self,
        input: &CreateSubscriptionInput,
        event: &NewEvent,
    ) -> AppResult<Subscription>;
    /// Conditional write: persists `change` plus the accompanying payment and
    /// event in one transaction, but only while the row's version still equals
    /// `expected_version`. A version mismatch fails with
    /// [`AppError::ConcurrencyConflict`] and leaves nothing behind.
    async fn apply_change(
        &self,
        id: Uuid,
        expected_version: i64,
        change: &SubscriptionChange,
        payment: Option<&NewPayment>,
        event: &NewEvent,
    ) -> AppResult<(Subscription, Option<SubscriptionPayment>)>;
}

#[async_trait]
pub trait SubscriptionPaymentRepo: Send + Sync {
    /// Append a payment without touching the subscription row.
    async fn insert(
        &self,
        subscription_id: Uuid,
        payment: &NewPayment,
    ) -> AppResult<SubscriptionPayment>;
    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionPayment>>;
    async fn reference_exists(
        &self,
        subscription_id: Uuid,
        reference_number: &str,
    ) -> AppResult<bool>;
}

#[async_trait]
pub trait SubscriptionEventRepo: Send + Sync {
    async fn list_by_subscription(&self, subscription_id: Uuid)
    -> AppResult<Vec<SubscriptionEvent>>;
}

// ============================================================================
// Proration
// ============================================================================

/// Calendar days from `today` to `expiry`, clamped into the 0..=365 window the
/// proration formula is defined over. The clamp keeps the prorated charge at
/// zero for an already-expired term and at most one full price delta when
/// extensions have pushed expiry more than a year out.
pub fn remaining_term_days(today: NaiveDate, expiry: NaiveDate) -> i64 {
    expiry
        .signed_duration_since(today)
        .num_days()
        .clamp(0, SUBSCRIPTION_TERM_DAYS)
}

/// Time-weighted charge for moving to a pricier plan mid-term:
/// `price_delta * remaining_days / 365`, rounded half-up to two decimals.
pub fn prorated_upgrade_charge(price_delta: Decimal, remaining_days: i64) -> Decimal {
    (price_delta * Decimal::from(remaining_days) / Decimal::from(SUBSCRIPTION_TERM_DAYS))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ============================================================================
// Use Cases
// ============================================================================

/// The subscription state machine. Every mutation is load, compute,
/// conditional write; losers of a write race get a ConcurrencyConflict and the
/// caller decides whether to resubmit.
#[derive(Clone)]
pub struct SubscriptionLifecycle {
    subscription_repo: Arc<dyn SubscriptionRepo>,
    plan_repo: Arc<dyn PricingPlanRepo>,
    payment_repo: Arc<dyn SubscriptionPaymentRepo>,
    event_repo: Arc<dyn SubscriptionEventRepo>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionLifecycle {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepo>,
        plan_repo: Arc<dyn PricingPlanRepo>,
        payment_repo: Arc<dyn SubscriptionPaymentRepo>,
        event_repo: Arc<dyn SubscriptionEventRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            subscription_repo,
            plan_repo,
            payment_repo,
            event_repo,
            clock,
        }
    }

    async fn load(&self, id: Uuid) -> AppResult<Subscription> {
        self.subscription_repo
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Load scoped to the caller's tenant. A subscription owned by another
    /// tenant reads as missing, so ids never leak across tenants.
    async fn load_owned(&self, id: Uuid, ctx: TenantContext) -> AppResult<Subscription> {
        let sub = self.load(id).await?;
        if sub.tenant_id != ctx.tenant_id {
            return Err(AppError::NotFound);
        }
        Ok(sub)
    }

    async fn load_plan(&self, id: Uuid) -> AppResult<PricingPlan> {
        self.plan_repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn get_current(&self, tenant_id: Uuid) -> AppResult<Subscription> {
        self.subscription_repo
            .get_current_by_tenant(tenant_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn create_with_trial(
        &self,
        tenant_id: Uuid,
        plan_id: Uuid,
        trial_days: Option<i32>,
        actor_id: Uuid,
    ) -> AppResult<Subscription> {
        let plan = self.load_plan(plan_id).await?;
        if !plan.active {
            return Err(AppError::RuleViolation(format!(
                "Plan '{}' is not active",
                plan.name
            )));
        }

        let trial_days = trial_days.unwrap_or(plan.default_trial_days);
        if !(1..=365).contains(&trial_days) {
            return Err(AppError::InvalidInput(
                "Trial days must be within 1-365".into(),
            ));
        }

        if let Some(existing) = self
            .subscription_repo
            .get_current_by_tenant(tenant_id)
            .await?
        {
            if existing.status.is_live() {
                return Err(AppError::RuleViolation(
                    "Tenant already has a live subscription".into(),
                ));
            }
        }

        let today = self.clock.today();
        let trial_end = today + Duration::days(i64::from(trial_days));

        let input = CreateSubscriptionInput {
            tenant_id,
            plan_id,
            status: SubscriptionStatus::Trial,
            start_date: today,
            trial_end_date: Some(trial_end),
            expiry_date: None,
            grace_period_days: plan.default_grace_period_days,
        };
        let event = NewEvent {
            event_type: SubscriptionEventType::TrialStarted,
            days_added: Some(trial_days),
            previous_expiry_date: None,
            new_expiry_date: None,
            previous_status: None,
            new_status: Some(SubscriptionStatus::Trial),
            reason: None,
            performed_by: actor_id,
        };
        self.subscription_repo.create(&input, &event).await
    }

    pub async fn activate(
        &self,
        ctx: TenantContext,
        subscription_id: Uuid,
        input: ActivateInput,
        actor_id: Uuid,
    ) -> AppResult<Subscription> {
        if input.reference_number.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Reference number is required".into(),
            ));
        }

        let sub = self.load_owned(subscription_id, ctx).await?;
        if !matches!(
            sub.status,
            SubscriptionStatus::Trial | SubscriptionStatus::PastDue
        ) {
            return Err(AppError::RuleViolation(format!(
                "Only trial or past-due subscriptions can be activated (current: {})",
                sub.status
            )));
        }

        if self
            .payment_repo
            .reference_exists(subscription_id, &input.reference_number)
            .await?
        {
            return Err(AppError::RuleViolation(format!(
                "Reference number '{}' was already used for this subscription",
                input.reference_number
            )));
        }

        let plan = self.load_plan(sub.plan_id).await?;
        let expiry = input.payment_date + Duration::days(SUBSCRIPTION_TERM_DAYS);

        let mut change = SubscriptionChange::keeping(&sub);
        change.status = SubscriptionStatus::Active;
        change.start_date = input.payment_date;
        change.expiry_date = Some(expiry);
        // trial_end_date stays as history of the original trial window.

        let payment = NewPayment {
            amount: plan.yearly_price,
            payment_type: PaymentType::InitialActivation,
            payment_date: input.payment_date,
            reference_number: input.reference_number,
            notes: input.notes.clone(),
            recorded_by: actor_id,
        };
        let event = NewEvent {
            event_type: SubscriptionEventType::Activated,
            days_added: None,
            previous_expiry_date: sub.expiry_date,
            new_expiry_date: Some(expiry),
            previous_status: Some(sub.status),
            new_status: Some(SubscriptionStatus::Active),
            reason: input.notes,
            performed_by: actor_id,
        };

        let (sub, _) = self
            .subscription_repo
            .apply_change(subscription_id, sub.version, &change, Some(&payment), &event)
            .await?;
        Ok(sub)
    }

    /// Money-recording only. Extending the term on renewal is a separate,
    /// explicit `extend_subscription` call so date changes stay independently
    /// auditable.
    pub async fn record_payment(
        &self,
        ctx: TenantContext,
        subscription_id: Uuid,
        input: RecordPaymentInput,
        actor_id: Uuid,
    ) -> AppResult<SubscriptionPayment> {
        if input.reference_number.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Reference number is required".into(),
            ));
        }
        if input.amount < Decimal::ZERO {
            return Err(AppError::InvalidInput(
                "Payment amount cannot be negative".into(),
            ));
        }

        self.load_owned(subscription_id, ctx).await?;

        if self
            .payment_repo
            .reference_exists(subscription_id, &input.reference_number)
            .await?
        {
            return Err(AppError::RuleViolation(format!(
                "Reference number '{}' was already used for this subscription",
                input.reference_number
            )));
        }

        let payment = NewPayment {
            amount: input
                .amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            payment_type: input.payment_type,
            payment_date: input.payment_date,
            reference_number: input.reference_number,
            notes: input.notes,
            recorded_by: actor_id,
        };
        self.payment_repo.insert(subscription_id, &payment).await
    }

    pub async fn extend_trial(
        &self,
        ctx: TenantContext,
        subscription_id: Uuid,
        additional_days: i32,
        reason: String,
        actor_id: Uuid,
    ) -> AppResult<Subscription> {
        require_reason(&reason)?;
        require_positive_days(additional_days)?;

        let sub = self.load_owned(subscription_id, ctx).await?;
        if sub.status != SubscriptionStatus::Trial {
            return Err(AppError::RuleViolation(
                "Only trial subscriptions can have the trial extended".into(),
            ));
        }
        let trial_end = sub.trial_end_date.ok_or_else(|| {
            AppError::Internal("Trial subscription is missing its trial end date".into())
        })?;

        let mut change = SubscriptionChange::keeping(&sub);
        change.trial_end_date = Some(trial_end + Duration::days(i64::from(additional_days)));

        let event = NewEvent {
            event_type: SubscriptionEventType::TrialExtended,
            days_added: Some(additional_days),
            previous_expiry_date: None,
            new_expiry_date: None,
            previous_status: Some(sub.status),
            new_status: Some(sub.status),
            reason: Some(reason),
            performed_by: actor_id,
        };
        let (sub, _) = self
            .subscription_repo
            .apply_change(subscription_id, sub.version, &change, None, &event)
            .await?;
        Ok(sub)
    }

    pub async fn extend_subscription(
        &self,
        ctx: TenantContext,
        subscription_id: Uuid,
        additional_days: i32,
        reason: String,
        actor_id: Uuid,
    ) -> AppResult<Subscription> {
        require_reason(&reason)?;
        require_positive_days(additional_days)?;

        let sub = self.load_owned(subscription_id, ctx).await?;
        if !matches!(
            sub.status,
            SubscriptionStatus::Active | SubscriptionStatus::PastDue
        ) {
            return Err(AppError::RuleViolation(
                "Only active or past-due subscriptions can be extended".into(),
            ));
        }
        let expiry = sub
            .expiry_date
            .ok_or_else(|| AppError::Internal("Subscription is missing its expiry date".into()))?;
        let new_expiry = expiry + Duration::days(i64::from(additional_days));

        let mut change = SubscriptionChange::keeping(&sub);
        change.expiry_date = Some(new_expiry);

        let event = NewEvent {
            event_type: SubscriptionEventType::SubscriptionExtended,
            days_added: Some(additional_days),
            previous_expiry_date: Some(expiry),
            new_expiry_date: Some(new_expiry),
            previous_status: Some(sub.status),
            new_status: Some(sub.status),
            reason: Some(reason),
            performed_by: actor_id,
        };
        let (sub, _) = self
            .subscription_repo
            .apply_change(subscription_id, sub.version, &change, None, &event)
            .await?;
        Ok(sub)
    }

    /// Move to a plan that costs at least as much, charging the time-weighted
    /// difference for the rest of the term. Expiry never moves here.
    pub async fn upgrade_plan(
        &self,
        ctx: TenantContext,
        subscription_id: Uuid,
        new_plan_id: Uuid,
        notes: Option<String>,
        actor_id: Uuid,
    ) -> AppResult<UpgradeOutcome> {
        let sub = self.load_owned(subscription_id, ctx).await?;
        let Some(expiry) = sub.expiry_date else {
            return Err(AppError::RuleViolation(
                "Trial subscriptions choose their plan at activation; upgrade requires an activated term".into(),
            ));
        };
        if !matches!(
            sub.status,
            SubscriptionStatus::Active | SubscriptionStatus::PastDue
        ) {
            return Err(AppError::RuleViolation(
                "Suspended subscriptions cannot change plans".into(),
            ));
        }

        let old_plan = self.load_plan(sub.plan_id).await?;
        let new_plan = self.load_plan(new_plan_id).await?;
        if !new_plan.active {
            return Err(AppError::RuleViolation(format!(
                "Plan '{}' is not active",
                new_plan.name
            )));
        }
        if new_plan.yearly_price < old_plan.yearly_price {
            return Err(AppError::RuleViolation(
                "Target plan is cheaper than the current plan; use the downgrade path".into(),
            ));
        }

        let remaining = remaining_term_days(self.clock.today(), expiry);
        let price_delta = new_plan.yearly_price - old_plan.yearly_price;
        let prorated = prorated_upgrade_charge(price_delta, remaining);

        let mut change = SubscriptionChange::keeping(&sub);
        change.plan_id = new_plan.id;
        change.grace_period_days = new_plan.default_grace_period_days;

        let payment = NewPayment {
            amount: prorated,
            payment_type: PaymentType::UpgradeProration,
            payment_date: self.clock.today(),
            reference_number: format!("UPG-{}", Uuid::new_v4()),
            notes: notes.clone(),
            recorded_by: actor_id,
        };
        let event = NewEvent {
            event_type: SubscriptionEventType::PlanUpgraded,
            days_added: None,
            previous_expiry_date: Some(expiry),
            new_expiry_date: Some(expiry),
            previous_status: Some(sub.status),
            new_status: Some(sub.status),
            reason: notes,
            performed_by: actor_id,
        };

        let (subscription, proration_payment) = self
            .subscription_repo
            .apply_change(subscription_id, sub.version, &change, Some(&payment), &event)
            .await?;
        let proration_payment = proration_payment
            .ok_or_else(|| AppError::Internal("Proration payment was not persisted".into()))?;

        Ok(UpgradeOutcome {
            subscription,
            proration_payment,
            prorated_amount: prorated,
        })
    }

    /// Move to a cheaper plan. Free of charge, but only while the tenant's
    /// active students fit under the target cap.
    pub async fn downgrade_plan(
        &self,
        ctx: TenantContext,
        active_student_count: i64,
        subscription_id: Uuid,
        new_plan_id: Uuid,
        reason: String,
        actor_id: Uuid,
    ) -> AppResult<Subscription> {
        require_reason(&reason)?;

        let sub = self.load_owned(subscription_id, ctx).await?;
        if !sub.status.is_live() {
            return Err(AppError::RuleViolation(
                "Suspended subscriptions cannot change plans".into(),
            ));
        }

        let old_plan = self.load_plan(sub.plan_id).await?;
        let new_plan = self.load_plan(new_plan_id).await?;
        if !new_plan.active {
            return Err(AppError::RuleViolation(format!(
                "Plan '{}' is not active",
                new_plan.name
            )));
        }
        if new_plan.yearly_price > old_plan.yearly_price {
            return Err(AppError::RuleViolation(
                "Target plan is more expensive; use the upgrade path".into(),
            ));
        }
        if active_student_count > i64::from(new_plan.student_cap) {
            return Err(AppError::RuleViolation(
                "Downgrade blocked: active students exceed target plan cap".into(),
            ));
        }

        let mut change = SubscriptionChange::keeping(&sub);
        change.plan_id = new_plan.id;
        change.grace_period_days = new_plan.default_grace_period_days;

        let event = NewEvent {
            event_type: SubscriptionEventType::PlanDowngraded,
            days_added: None,
            previous_expiry_date: sub.expiry_date,
            new_expiry_date: sub.expiry_date,
            previous_status: Some(sub.status),
            new_status: Some(sub.status),
            reason: Some(reason),
            performed_by: actor_id,
        };
        let (sub, _) = self
            .subscription_repo
            .apply_change(subscription_id, sub.version, &change, None, &event)
            .await?;
        Ok(sub)
    }

    /// Administrative override: block the tenant regardless of dates.
    pub async fn manual_suspend(
        &self,
        ctx: TenantContext,
        subscription_id: Uuid,
        reason: String,
        actor_id: Uuid,
    ) -> AppResult<Subscription> {
        require_reason(&reason)?;

        let sub = self.load_owned(subscription_id, ctx).await?;
        if sub.status == SubscriptionStatus::Suspended {
            return Err(AppError::RuleViolation(
                "Subscription is already suspended".into(),
            ));
        }

        let mut change = SubscriptionChange::keeping(&sub);
        change.status = SubscriptionStatus::Suspended;

        let event = NewEvent {
            event_type: SubscriptionEventType::Suspended,
            days_added: None,
            previous_expiry_date: sub.expiry_date,
            new_expiry_date: sub.expiry_date,
            previous_status: Some(sub.status),
            new_status: Some(SubscriptionStatus::Suspended),
            reason: Some(reason),
            performed_by: actor_id,
        };
        let (sub, _) = self
            .subscription_repo
            .apply_change(subscription_id, sub.version, &change, None, &event)
            .await?;
        Ok(sub)
    }

    /// Lift a manual suspension. The restored status follows the dates:
    /// within the paid/trial window the subscription comes back as active (or
    /// trial when never activated), past it as past-due. The referenced plan
    /// must still be on sale.
    pub async fn manual_reactivate(
        &self,
        ctx: TenantContext,
        subscription_id: Uuid,
        actor_id: Uuid,
    ) -> AppResult<Subscription> {
        let sub = self.load_owned(subscription_id, ctx).await?;
        if sub.status != SubscriptionStatus::Suspended {
            return Err(AppError::RuleViolation(
                "Only suspended subscriptions can be reactivated".into(),
            ));
        }

        let plan = self.load_plan(sub.plan_id).await?;
        if !plan.active {
            return Err(AppError::RuleViolation(format!(
                "Plan '{}' has been retired; the subscription cannot be reactivated on it",
                plan.name
            )));
        }

        let today = self.clock.today();
        let within_window = sub.access_deadline().is_some_and(|d| today <= d);
        let new_status = if !within_window {
            SubscriptionStatus::PastDue
        } else if sub.expiry_date.is_some() {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::Trial
        };

        let mut change = SubscriptionChange::keeping(&sub);
        change.status = new_status;

        let event = NewEvent {
            event_type: SubscriptionEventType::Reactivated,
            days_added: None,
            previous_expiry_date: sub.expiry_date,
            new_expiry_date: sub.expiry_date,
            previous_status: Some(sub.status),
            new_status: Some(new_status),
            reason: None,
            performed_by: actor_id,
        };
        let (sub, _) = self
            .subscription_repo
            .apply_change(subscription_id, sub.version, &change, None, &event)
            .await?;
        Ok(sub)
    }

    pub async fn list_payments(
        &self,
        ctx: TenantContext,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionPayment>> {
        self.load_owned(subscription_id, ctx).await?;
        self.payment_repo.list_by_subscription(subscription_id).await
    }

    pub async fn list_events(
        &self,
        ctx: TenantContext,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionEvent>> {
        self.load_owned(subscription_id, ctx).await?;
        self.event_repo.list_by_subscription(subscription_id).await
    }
}

fn require_reason(reason: &str) -> AppResult<()> {
    if reason.trim().is_empty() {
        return Err(AppError::InvalidInput("A reason is required".into()));
    }
    Ok(())
}

fn require_positive_days(days: i32) -> AppResult<()> {
    if days < 1 {
        return Err(AppError::InvalidInput(
            "Additional days must be at least 1".into(),
        ));
    }
    Ok(())
}
