pub mod pricing_plan;
pub mod subscription;
pub mod subscription_event;
pub mod subscription_payment;
