use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::warn;

use crate::services::auth_service;
use crate::web::{error::AppError, AppState};

pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    // Bearer header first, session cookie as fallback.
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| jar.get("token").map(|c| c.value().to_string()))
        .ok_or(AppError::InvalidCredentials)?;

    let authenticated_user = auth_service::validate_token(&token, &state.config.jwt_secret)
        .map_err(|e| {
            warn!(error = ?e, "Token validation failed in auth middleware.");
            AppError::InvalidCredentials
        })?;

    req.extensions_mut().insert(authenticated_user);
    Ok(next.run(req).await)
}
