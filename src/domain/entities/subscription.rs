use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    PastDue,
    Suspended,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Suspended => "suspended",
        }
    }

    /// A live subscription is commercial usage of its plan: it blocks plan
    /// retirement and prevents the tenant from opening a second trial.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Trial | SubscriptionStatus::Active | SubscriptionStatus::PastDue
        )
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The tenant's subscription row. `version` is the optimistic-concurrency
/// guard: every persisted mutation must name the version it read and bumps
/// it by one on success.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub trial_end_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub grace_period_days: i32,
    pub version: i64,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Subscription {
    /// The date access stops being fully valid: expiry once activated,
    /// trial end while never activated.
    pub fn access_deadline(&self) -> Option<NaiveDate> {
        self.expiry_date.or(self.trial_end_date)
    }

    /// Status a caller should act on right now. Time-driven transitions are
    /// derived here instead of being swept into the row by a scheduler, so
    /// the persisted status may lag behind this value.
    pub fn effective_status(&self, today: NaiveDate) -> SubscriptionStatus {
        if self.status == SubscriptionStatus::Suspended {
            return SubscriptionStatus::Suspended;
        }
        let Some(deadline) = self.access_deadline() else {
            return self.status;
        };
        if today <= deadline {
            if self.expiry_date.is_some() {
                SubscriptionStatus::Active
            } else {
                SubscriptionStatus::Trial
            }
        } else if today <= deadline + Duration::days(i64::from(self.grace_period_days)) {
            SubscriptionStatus::PastDue
        } else {
            SubscriptionStatus::Suspended
        }
    }

    /// Signed days from today to the access deadline. Negative once past it.
    pub fn days_to_deadline(&self, today: NaiveDate) -> Option<i64> {
        self.access_deadline()
            .map(|d| d.signed_duration_since(today).num_days())
    }
}
