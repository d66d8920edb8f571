pub mod access;
pub mod plan_catalog;
pub mod subscription_lifecycle;
