use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription::SubscriptionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionEventType {
    TrialStarted,
    Activated,
    TrialExtended,
    SubscriptionExtended,
    PlanUpgraded,
    PlanDowngraded,
    Suspended,
    Reactivated,
    StatusSynced,
}

impl SubscriptionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionEventType::TrialStarted => "trial_started",
            SubscriptionEventType::Activated => "activated",
            SubscriptionEventType::TrialExtended => "trial_extended",
            SubscriptionEventType::SubscriptionExtended => "subscription_extended",
            SubscriptionEventType::PlanUpgraded => "plan_upgraded",
            SubscriptionEventType::PlanDowngraded => "plan_downgraded",
            SubscriptionEventType::Suspended => "suspended",
            SubscriptionEventType::Reactivated => "reactivated",
            SubscriptionEventType::StatusSynced => "status_synced",
        }
    }
}

/// One row of the audit trail. Every status- or date-changing lifecycle
/// operation writes exactly one of these, atomically with the mutation.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionEvent {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub event_type: SubscriptionEventType,
    pub days_added: Option<i32>,
    pub previous_expiry_date: Option<NaiveDate>,
    pub new_expiry_date: Option<NaiveDate>,
    pub previous_status: Option<SubscriptionStatus>,
    pub new_status: Option<SubscriptionStatus>,
    pub reason: Option<String>,
    pub performed_by: Uuid,
    pub created_at: Option<NaiveDateTime>,
}
