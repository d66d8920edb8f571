pub mod pricing_plans;
pub mod subscriptions;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/pricing-plans", pricing_plans::router())
        .nest("/subscriptions", subscriptions::router())
}
