//! Test data factories for creating valid fixtures.
//!
//! Each factory creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    application::use_cases::{
        plan_catalog::CreatePlanInput, subscription_lifecycle::SubscriptionLifecycle,
    },
    domain::entities::{
        pricing_plan::PricingPlan,
        subscription::{Subscription, SubscriptionStatus},
    },
    test_utils::{FixedClock, InMemoryPersistence},
};

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn test_datetime() -> NaiveDateTime {
    date(2026, 1, 1).and_hms_opt(12, 0, 0).unwrap()
}

pub fn create_test_plan_input(overrides: impl FnOnce(&mut CreatePlanInput)) -> CreatePlanInput {
    let mut input = CreatePlanInput {
        name: "Basic".to_string(),
        yearly_price: Decimal::from(120_000),
        student_cap: 100,
        default_trial_days: 14,
        default_grace_period_days: 15,
        usage_warning_percent: 80,
        usage_critical_percent: 95,
    };
    overrides(&mut input);
    input
}

pub fn create_test_plan(overrides: impl FnOnce(&mut PricingPlan)) -> PricingPlan {
    let mut plan = PricingPlan {
        id: Uuid::new_v4(),
        name: "Basic".to_string(),
        yearly_price: Decimal::from(120_000),
        student_cap: 100,
        default_trial_days: 14,
        default_grace_period_days: 15,
        usage_warning_percent: 80,
        usage_critical_percent: 95,
        active: true,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut plan);
    plan
}

pub fn create_test_subscription(
    plan_id: Uuid,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let mut sub = Subscription {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        plan_id,
        status: SubscriptionStatus::Trial,
        start_date: date(2026, 1, 1),
        trial_end_date: Some(date(2026, 1, 15)),
        expiry_date: None,
        grace_period_days: 15,
        version: 1,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut sub);
    sub
}

/// A lifecycle wired so every repository port is the same in-memory store.
pub fn lifecycle_with(
    persistence: Arc<InMemoryPersistence>,
    clock: Arc<FixedClock>,
) -> SubscriptionLifecycle {
    SubscriptionLifecycle::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        persistence,
        clock,
    )
}
