use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    InitialActivation,
    Renewal,
    UpgradeProration,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::InitialActivation => "initial_activation",
            PaymentType::Renewal => "renewal",
            PaymentType::UpgradeProration => "upgrade_proration",
        }
    }
}

/// Money received or charged against a subscription. Append-only; the
/// reference number is unique per subscription and doubles as the
/// idempotency guard against duplicate submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionPayment {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub payment_date: NaiveDate,
    pub reference_number: String,
    pub notes: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: Option<NaiveDateTime>,
}
