use axum::http::HeaderMap;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::{context::TenantContext, jwt},
};

/// The authenticated caller: the acting platform user plus the tenant scope
/// carried in the token.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub actor_id: Uuid,
    pub tenant: TenantContext,
}

/// Resolves the bearer token from the Authorization header into an
/// [`AuthContext`]. Handlers call this first; any failure is a 401.
pub fn authenticate(headers: &HeaderMap, app_state: &AppState) -> AppResult<AuthContext> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let claims = jwt::verify(token, &app_state.config.jwt_secret)?;
    let actor_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
    let tenant_id = Uuid::parse_str(&claims.tenant_id).map_err(|_| AppError::Unauthorized)?;
    let academic_session_id =
        Uuid::parse_str(&claims.academic_session_id).map_err(|_| AppError::Unauthorized)?;

    Ok(AuthContext {
        actor_id,
        tenant: TenantContext {
            tenant_id,
            academic_session_id,
        },
    })
}
