use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, auth::authenticate},
    app_error::AppResult,
    application::use_cases::plan_catalog::{CreatePlanInput, UpdatePlanInput},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/{id}", get(get_plan).put(update_plan).delete(delete_plan))
        .route("/{id}/deactivate", patch(deactivate_plan))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    include_inactive: bool,
}

async fn create_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreatePlanInput>,
) -> AppResult<impl IntoResponse> {
    authenticate(&headers, &app_state)?;
    let plan = app_state.plan_catalog.create_plan(input).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn list_plans(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    authenticate(&headers, &app_state)?;
    let plans = app_state.plan_catalog.list_plans(query.include_inactive).await?;
    Ok(Json(plans))
}

async fn get_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    authenticate(&headers, &app_state)?;
    let plan = app_state.plan_catalog.get_plan(id).await?;
    Ok(Json(plan))
}

async fn update_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePlanInput>,
) -> AppResult<impl IntoResponse> {
    authenticate(&headers, &app_state)?;
    let plan = app_state.plan_catalog.update_plan(id, input).await?;
    Ok(Json(plan))
}

async fn deactivate_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authenticate(&headers, &app_state)?;
    app_state.plan_catalog.deactivate_plan(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authenticate(&headers, &app_state)?;
    app_state.plan_catalog.delete_plan(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
