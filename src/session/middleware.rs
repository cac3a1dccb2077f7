use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};

use crate::shared::{AppError, AppState};
use crate::token::AccessClaims;

/// Extracts the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            warn!("Missing Authorization header in request");
            AppError::AuthenticationFailed(
                "Authentication credentials were not provided.".to_string(),
            )
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            warn!("Invalid Authorization header format (expected Bearer token)");
            AppError::AuthenticationFailed("Invalid authorization header format".to_string())
        })
}

/// Authorization guard shared by explicit handlers and the middleware
pub async fn authorize_request(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AccessClaims, AppError> {
    let token = bearer_token(headers)?;
    state.session_service.authorize(token).await
}

/// Rejects requests without a valid access token and adds AccessClaims to the request.
/// Usage: .layer(middleware::from_fn_with_state(app_state.clone(), session::require_access_token))
/// Handlers can then extract Extension(claims): Extension<AccessClaims>.
#[instrument(skip(state, req, next), fields(uri = %req.uri()))]
pub async fn require_access_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authorize_request(&state, req.headers()).await?;

    debug!(user_id = %claims.sub, "Access token accepted");

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
