use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        access::{AccessEvaluator, StudentDirectory},
        plan_catalog::{PlanCatalog, PricingPlanRepo},
        subscription_lifecycle::{
            SubscriptionEventRepo, SubscriptionLifecycle, SubscriptionPaymentRepo, SubscriptionRepo,
        },
    },
    infra::{clock::SystemClock, config::AppConfig, postgres_persistence},
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let clock = Arc::new(SystemClock);

    let plan_repo = postgres_arc.clone() as Arc<dyn PricingPlanRepo>;
    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let payment_repo = postgres_arc.clone() as Arc<dyn SubscriptionPaymentRepo>;
    let event_repo = postgres_arc.clone() as Arc<dyn SubscriptionEventRepo>;
    let students = postgres_arc.clone() as Arc<dyn StudentDirectory>;

    let plan_catalog = PlanCatalog::new(plan_repo.clone());
    let lifecycle = SubscriptionLifecycle::new(
        subscription_repo.clone(),
        plan_repo.clone(),
        payment_repo,
        event_repo,
        clock.clone(),
    );
    let access = AccessEvaluator::new(subscription_repo, plan_repo, students, clock);

    Ok(AppState {
        config: Arc::new(config),
        plan_catalog: Arc::new(plan_catalog),
        lifecycle: Arc::new(lifecycle),
        access: Arc::new(access),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campus_billing=debug,tower_http=debug".into());

    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init()
        .ok();
}
