use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named commercial plan a school subscribes to. Prices are yearly,
/// fixed-point with two decimals.
#[derive(Debug, Clone, Serialize)]
pub struct PricingPlan {
    pub id: Uuid,
    pub name: String,
    pub yearly_price: Decimal,
    pub student_cap: i32,
    pub default_trial_days: i32,
    pub default_grace_period_days: i32,
    pub usage_warning_percent: i32,
    pub usage_critical_percent: i32,
    pub active: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Severity buckets for usage and expiry warnings, derived at read time and
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    None,
    Warning,
    Critical,
}

impl WarningLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningLevel::None => "none",
            WarningLevel::Warning => "warning",
            WarningLevel::Critical => "critical",
        }
    }
}
