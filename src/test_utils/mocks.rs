//! In-memory mock implementations for the repository and port traits.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        clock::Clock,
        context::TenantContext,
        use_cases::{
            access::StudentDirectory,
            plan_catalog::{CreatePlanInput, PricingPlanRepo, UpdatePlanInput},
            subscription_lifecycle::{
                CreateSubscriptionInput, NewEvent, NewPayment, SubscriptionChange,
                SubscriptionEventRepo, SubscriptionPaymentRepo, SubscriptionRepo,
            },
        },
    },
    domain::entities::{
        pricing_plan::PricingPlan,
        subscription::Subscription,
        subscription_event::SubscriptionEvent,
        subscription_payment::SubscriptionPayment,
    },
};

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

// ============================================================================
// InMemoryPersistence
// ============================================================================

#[derive(Default)]
struct State {
    plans: Vec<PricingPlan>,
    subscriptions: Vec<Subscription>,
    payments: Vec<SubscriptionPayment>,
    events: Vec<SubscriptionEvent>,
}

/// One store behind every repository trait, mirroring the real persistence
/// adapter: a versioned subscription write and its payment/event land together
/// under a single lock, so the exactly-one-winner semantics hold in tests too.
#[derive(Default)]
pub struct InMemoryPersistence {
    state: Mutex<State>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_plan(&self, plan: PricingPlan) -> PricingPlan {
        let mut state = self.state.lock().unwrap();
        state.plans.push(plan.clone());
        plan
    }

    pub fn set_plan_active(&self, id: Uuid, active: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(plan) = state.plans.iter_mut().find(|p| p.id == id) {
            plan.active = active;
        }
    }

    pub fn insert_subscription(&self, sub: Subscription) -> Subscription {
        let mut state = self.state.lock().unwrap();
        state.subscriptions.push(sub.clone());
        sub
    }

    /// Panics when the row is missing; test-only convenience.
    pub fn get_subscription(&self, id: Uuid) -> Subscription {
        let state = self.state.lock().unwrap();
        state
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .unwrap()
    }

    pub fn payments_for(&self, subscription_id: Uuid) -> Vec<SubscriptionPayment> {
        let state = self.state.lock().unwrap();
        state
            .payments
            .iter()
            .filter(|p| p.subscription_id == subscription_id)
            .cloned()
            .collect()
    }

    pub fn events_for(&self, subscription_id: Uuid) -> Vec<SubscriptionEvent> {
        let state = self.state.lock().unwrap();
        state
            .events
            .iter()
            .filter(|e| e.subscription_id == subscription_id)
            .cloned()
            .collect()
    }
}

fn build_payment(subscription_id: Uuid, payment: &NewPayment) -> SubscriptionPayment {
    SubscriptionPayment {
        id: Uuid::new_v4(),
        subscription_id,
        amount: payment.amount,
        payment_type: payment.payment_type,
        payment_date: payment.payment_date,
        reference_number: payment.reference_number.clone(),
        notes: payment.notes.clone(),
        recorded_by: payment.recorded_by,
        created_at: Some(now()),
    }
}

fn build_event(subscription_id: Uuid, event: &NewEvent) -> SubscriptionEvent {
    SubscriptionEvent {
        id: Uuid::new_v4(),
        subscription_id,
        event_type: event.event_type,
        days_added: event.days_added,
        previous_expiry_date: event.previous_expiry_date,
        new_expiry_date: event.new_expiry_date,
        previous_status: event.previous_status,
        new_status: event.new_status,
        reason: event.reason.clone(),
        performed_by: event.performed_by,
        created_at: Some(now()),
    }
}

#[async_trait]
impl PricingPlanRepo for InMemoryPersistence {
    async fn create(&self, input: &CreatePlanInput) -> AppResult<PricingPlan> {
        let mut state = self.state.lock().unwrap();
        if state
            .plans
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(&input.name))
        {
            return Err(AppError::RuleViolation(
                "A record with this value already exists".into(),
            ));
        }
        let plan = PricingPlan {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            yearly_price: input.yearly_price,
            student_cap: input.student_cap,
            default_trial_days: input.default_trial_days,
            default_grace_period_days: input.default_grace_period_days,
            usage_warning_percent: input.usage_warning_percent,
            usage_critical_percent: input.usage_critical_percent,
            active: true,
            created_at: Some(now()),
            updated_at: Some(now()),
        };
        state.plans.push(plan.clone());
        Ok(plan)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PricingPlan>> {
        let state = self.state.lock().unwrap();
        Ok(state.plans.iter().find(|p| p.id == id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> AppResult<Option<PricingPlan>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .plans
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn list(&self, include_inactive: bool) -> AppResult<Vec<PricingPlan>> {
        let state = self.state.lock().unwrap();
        let mut plans: Vec<PricingPlan> = state
            .plans
            .iter()
            .filter(|p| include_inactive || p.active)
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.yearly_price.cmp(&b.yearly_price));
        Ok(plans)
    }

    async fn update(&self, id: Uuid, input: &UpdatePlanInput) -> AppResult<PricingPlan> {
        let mut state = self.state.lock().unwrap();
        let plan = state
            .plans
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::NotFound)?;
        if let Some(name) = &input.name {
            plan.name = name.clone();
        }
        if let Some(price) = input.yearly_price {
            plan.yearly_price = price;
        }
        if let Some(cap) = input.student_cap {
            plan.student_cap = cap;
        }
        if let Some(days) = input.default_trial_days {
            plan.default_trial_days = days;
        }
        if let Some(days) = input.default_grace_period_days {
            plan.default_grace_period_days = days;
        }
        if let Some(pct) = input.usage_warning_percent {
            plan.usage_warning_percent = pct;
        }
        if let Some(pct) = input.usage_critical_percent {
            plan.usage_critical_percent = pct;
        }
        plan.updated_at = Some(now());
        Ok(plan.clone())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> AppResult<()> {
        self.set_plan_active(id, active);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.plans.retain(|p| p.id != id);
        Ok(())
    }

    async fn count_live_subscriptions(&self, plan_id: Uuid) -> AppResult<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.plan_id == plan_id && s.status.is_live())
            .count() as i64)
    }
}

#[async_trait]
impl SubscriptionRepo for InMemoryPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let state = self.state.lock().unwrap();
        Ok(state.subscriptions.iter().find(|s| s.id == id).cloned())
    }

    async fn get_current_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<Subscription>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.tenant_id == tenant_id)
            .next_back()
            .cloned())
    }

    async fn create(
        &self,
        input: &CreateSubscriptionInput,
        event: &NewEvent,
    ) -> AppResult<Subscription> {
        let mut state = self.state.lock().unwrap();
        let sub = Subscription {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            plan_id: input.plan_id,
            status: input.status,
            start_date: input.start_date,
            trial_end_date: input.trial_end_date,
            expiry_date: input.expiry_date,
            grace_period_days: input.grace_period_days,
            version: 1,
            created_at: Some(now()),
            updated_at: Some(now()),
        };
        let event = build_event(sub.id, event);
        state.subscriptions.push(sub.clone());
        state.events.push(event);
        Ok(sub)
    }

    async fn apply_change(
        &self,
        id: Uuid,
        expected_version: i64,
        change: &SubscriptionChange,
        payment: Option<&NewPayment>,
        event: &NewEvent,
    ) -> AppResult<(Subscription, Option<SubscriptionPayment>)> {
        let mut state = self.state.lock().unwrap();
        let Some(sub) = state.subscriptions.iter_mut().find(|s| s.id == id) else {
            return Err(AppError::NotFound);
        };
        if sub.version != expected_version {
            return Err(AppError::ConcurrencyConflict);
        }

        sub.plan_id = change.plan_id;
        sub.status = change.status;
        sub.start_date = change.start_date;
        sub.trial_end_date = change.trial_end_date;
        sub.expiry_date = change.expiry_date;
        sub.grace_period_days = change.grace_period_days;
        sub.version += 1;
        sub.updated_at = Some(now());
        let sub = sub.clone();

        let persisted_payment = payment.map(|p| build_payment(id, p));
        if let Some(p) = &persisted_payment {
            state.payments.push(p.clone());
        }
        state.events.push(build_event(id, event));

        Ok((sub, persisted_payment))
    }
}

#[async_trait]
impl SubscriptionPaymentRepo for InMemoryPersistence {
    async fn insert(
        &self,
        subscription_id: Uuid,
        payment: &NewPayment,
    ) -> AppResult<SubscriptionPayment> {
        let mut state = self.state.lock().unwrap();
        if state.payments.iter().any(|p| {
            p.subscription_id == subscription_id
                && p.reference_number == payment.reference_number
        }) {
            return Err(AppError::RuleViolation(
                "A record with this value already exists".into(),
            ));
        }
        let payment = build_payment(subscription_id, payment);
        state.payments.push(payment.clone());
        Ok(payment)
    }

    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionPayment>> {
        let mut payments = self.payments_for(subscription_id);
        payments.reverse();
        Ok(payments)
    }

    async fn reference_exists(
        &self,
        subscription_id: Uuid,
        reference_number: &str,
    ) -> AppResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.payments.iter().any(|p| {
            p.subscription_id == subscription_id && p.reference_number == reference_number
        }))
    }
}

#[async_trait]
impl SubscriptionEventRepo for InMemoryPersistence {
    async fn list_by_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Vec<SubscriptionEvent>> {
        let mut events = self.events_for(subscription_id);
        events.reverse();
        Ok(events)
    }
}

// ============================================================================
// InMemoryStudentDirectory
// ============================================================================

#[derive(Default)]
pub struct InMemoryStudentDirectory {
    counts: Mutex<HashMap<(Uuid, Uuid), i64>>,
}

impl InMemoryStudentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_count(&self, ctx: TenantContext, count: i64) {
        self.counts
            .lock()
            .unwrap()
            .insert((ctx.tenant_id, ctx.academic_session_id), count);
    }
}

#[async_trait]
impl StudentDirectory for InMemoryStudentDirectory {
    async fn active_student_count(&self, ctx: TenantContext) -> AppResult<i64> {
        Ok(self
            .counts
            .lock()
            .unwrap()
            .get(&(ctx.tenant_id, ctx.academic_session_id))
            .copied()
            .unwrap_or(0))
    }
}

// ============================================================================
// FixedClock
// ============================================================================

/// A pinned calendar. `set_today` moves it mid-test to cross a deadline.
pub struct FixedClock {
    today: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set_today(&self, today: NaiveDate) {
        *self.today.lock().unwrap() = today;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock().unwrap()
    }
}

// ============================================================================
// GatedSubscriptionRepo
// ============================================================================

/// Delegates to the in-memory store but holds every `get_by_id` at a barrier
/// until `participants` callers have read, forcing racing writers to all
/// observe the same version before any of them writes.
pub struct GatedSubscriptionRepo {
    inner: Arc<InMemoryPersistence>,
    barrier: tokio::sync::Barrier,
}

impl GatedSubscriptionRepo {
    pub fn new(inner: Arc<InMemoryPersistence>, participants: usize) -> Self {
        Self {
            inner,
            barrier: tokio::sync::Barrier::new(participants),
        }
    }
}

#[async_trait]
impl SubscriptionRepo for GatedSubscriptionRepo {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let sub = SubscriptionRepo::get_by_id(&*self.inner, id).await?;
        self.barrier.wait().await;
        Ok(sub)
    }

    async fn get_current_by_tenant(&self, tenant_id: Uuid) -> AppResult<Option<Subscription>> {
        self.inner.get_current_by_tenant(tenant_id).await
    }

    async fn create(
        &self,
        input: &CreateSubscriptionInput,
        event: &NewEvent,
    ) -> AppResult<Subscription> {
        SubscriptionRepo::create(&*self.inner, input, event).await
    }

    async fn apply_change(
        &self,
        id: Uuid,
        expected_version: i64,
        change: &SubscriptionChange,
        payment: Option<&NewPayment>,
        event: &NewEvent,
    ) -> AppResult<(Subscription, Option<SubscriptionPayment>)> {
        self.inner
            .apply_change(id, expected_version, change, payment, event)
            .await
    }
}
