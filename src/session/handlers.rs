use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use tracing::{info, instrument};

use super::middleware::authorize_request;
use super::types::{
    LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RefreshResponse, RegisterRequest,
};
use crate::shared::{AppError, AppState, FieldErrors, NON_FIELD_ERRORS};
use crate::token::AccessClaims;
use crate::user::PublicIdentity;

/// Malformed or missing JSON bodies are reported as validation errors
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| {
            AppError::Validation(FieldErrors::single(NON_FIELD_ERRORS, rejection.body_text()))
        })
}

/// POST /register
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicIdentity>), AppError> {
    let request = json_body(payload)?;
    let identity = state.session_service.register(request).await?;

    Ok((StatusCode::CREATED, Json(identity)))
}

/// POST /login
///
/// Returns an access/refresh token pair
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let request = json_body(payload)?;
    let pair = state.session_service.login(request).await?;

    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// POST /logout
///
/// Requires a Bearer access token; the body names the refresh token to revoke
#[instrument(skip(state, headers, payload))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let claims = authorize_request(&state, &headers).await?;
    let request = json_body(payload)?;

    state.session_service.logout(&claims, request).await?;

    info!(user_id = %claims.sub, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /token/refresh
#[instrument(skip(state, payload))]
pub async fn refresh_token(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, AppError> {
    let request = json_body(payload)?;
    let access_token = state.session_service.refresh(request).await?;

    Ok(Json(RefreshResponse { access_token }))
}

/// GET /me, behind `require_access_token`
#[instrument(skip(state, claims))]
pub async fn current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessClaims>,
) -> Result<Json<PublicIdentity>, AppError> {
    let identity = state.session_service.current_identity(&claims).await?;
    Ok(Json(identity))
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}
