use std::sync::Arc;

use crate::{
    application::use_cases::{
        access::AccessEvaluator, plan_catalog::PlanCatalog,
        subscription_lifecycle::SubscriptionLifecycle,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub plan_catalog: Arc<PlanCatalog>,
    pub lifecycle: Arc<SubscriptionLifecycle>,
    pub access: Arc<AccessEvaluator>,
}
