use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{verify_session_token, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// Verifies the session token and attaches the caller as an `AuthUser`
/// request extension.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = match extract_bearer(request.headers()) {
        Some(token) => token?,
        // Browsers cannot set headers on a websocket upgrade
        None => extract_query_token(request.uri().query())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?,
    };

    let claims = verify_session_token(&token, &state.config.security).map_err(|e| {
        tracing::debug!("Rejected session token: {}", e);
        ApiError::unauthorized("Invalid or expired token")
    })?;

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Runs after `jwt_auth_middleware`; lets only admins through.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let Some(user) = request.extensions().get::<AuthUser>().cloned() else {
        return Err(ApiError::unauthorized("Missing Authorization header"));
    };
    if !user.is_admin() {
        tracing::warn!(user_id = %user.user_id, path = %request.uri().path(), "admin route denied");
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<Result<String, ApiError>> {
    let value = headers.get(AUTHORIZATION)?;
    let parsed = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header format"))
        .and_then(|raw| {
            let token = raw
                .strip_prefix("Bearer ")
                .ok_or_else(|| ApiError::unauthorized("Authorization header must use Bearer token format"))?
                .trim();
            if token.is_empty() {
                return Err(ApiError::unauthorized("Empty JWT token"));
            }
            Ok(token.to_string())
        });
    Some(parsed)
}

fn extract_query_token(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}
