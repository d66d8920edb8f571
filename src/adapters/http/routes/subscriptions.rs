use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, auth::authenticate},
    app_error::AppResult,
    application::use_cases::subscription_lifecycle::{ActivateInput, RecordPaymentInput},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trial", post(create_trial))
        .route("/current", get(get_current))
        .route("/access-status", get(access_status))
        .route("/sync-status", post(sync_status))
        .route("/{id}/activate", post(activate))
        .route("/{id}/payments", get(list_payments).post(record_payment))
        .route("/{id}/events", get(list_events))
        .route("/{id}/upgrade", post(upgrade))
        .route("/{id}/downgrade", post(downgrade))
        .route("/{id}/extend-trial", post(extend_trial))
        .route("/{id}/extend", post(extend))
        .route("/{id}/suspend", post(suspend))
        .route("/{id}/reactivate", post(reactivate))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
struct CreateTrialPayload {
    tenant_id: Uuid,
    plan_id: Uuid,
    trial_days: Option<i32>,
}

#[derive(Deserialize)]
struct UpgradePayload {
    new_plan_id: Uuid,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct DowngradePayload {
    new_plan_id: Uuid,
    reason: String,
}

#[derive(Deserialize)]
struct ExtendPayload {
    additional_days: i32,
    reason: String,
}

#[derive(Deserialize)]
struct SuspendPayload {
    reason: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_trial(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTrialPayload>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let sub = app_state
        .lifecycle
        .create_with_trial(
            payload.tenant_id,
            payload.plan_id,
            payload.trial_days,
            auth.actor_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(sub)))
}

async fn get_current(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let sub = app_state.lifecycle.get_current(auth.tenant.tenant_id).await?;
    Ok(Json(sub))
}

async fn access_status(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let status = app_state.access.validate_school_access(auth.tenant).await?;
    Ok(Json(status))
}

/// Folds a time-derived transition into the row. Explicit admin trigger; the
/// evaluator never persists on plain reads.
async fn sync_status(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let sub = app_state
        .access
        .persist_effective_status(auth.tenant.tenant_id, auth.actor_id)
        .await?;
    Ok(Json(sub))
}

async fn activate(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<ActivateInput>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let sub = app_state
        .lifecycle
        .activate(auth.tenant, id, input, auth.actor_id)
        .await?;
    Ok(Json(sub))
}

async fn record_payment(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let payment = app_state
        .lifecycle
        .record_payment(auth.tenant, id, input, auth.actor_id)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn list_payments(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let payments = app_state.lifecycle.list_payments(auth.tenant, id).await?;
    Ok(Json(payments))
}

async fn list_events(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let events = app_state.lifecycle.list_events(auth.tenant, id).await?;
    Ok(Json(events))
}

async fn upgrade(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpgradePayload>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let outcome = app_state
        .lifecycle
        .upgrade_plan(auth.tenant, id, payload.new_plan_id, payload.notes, auth.actor_id)
        .await?;
    Ok(Json(outcome))
}

async fn downgrade(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<DowngradePayload>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let count = app_state
        .access
        .validate_school_access(auth.tenant)
        .await?
        .active_students;
    let sub = app_state
        .lifecycle
        .downgrade_plan(
            auth.tenant,
            count,
            id,
            payload.new_plan_id,
            payload.reason,
            auth.actor_id,
        )
        .await?;
    Ok(Json(sub))
}

async fn extend_trial(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExtendPayload>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let sub = app_state
        .lifecycle
        .extend_trial(auth.tenant, id, payload.additional_days, payload.reason, auth.actor_id)
        .await?;
    Ok(Json(sub))
}

async fn extend(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExtendPayload>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let sub = app_state
        .lifecycle
        .extend_subscription(auth.tenant, id, payload.additional_days, payload.reason, auth.actor_id)
        .await?;
    Ok(Json(sub))
}

async fn suspend(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<SuspendPayload>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let sub = app_state
        .lifecycle
        .manual_suspend(auth.tenant, id, payload.reason, auth.actor_id)
        .await?;
    Ok(Json(sub))
}

async fn reactivate(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let auth = authenticate(&headers, &app_state)?;
    let sub = app_state
        .lifecycle
        .manual_reactivate(auth.tenant, id, auth.actor_id)
        .await?;
    Ok(Json(sub))
}
