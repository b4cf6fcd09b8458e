use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, DecodingKey, Validation};
use std::sync::Arc;

use crate::web::error::AppError;
use crate::web::models::{AuthenticatedUser, Claims, SessionRequest, UserResponse};
use crate::web::AppState;

/// Validates a token issued by the hosted authenticator. This is the only
/// credential check in the system; no credentials are stored or compared
/// locally.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<AuthenticatedUser, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidCredentials)?;

    Ok(AuthenticatedUser {
        subject: token_data.claims.sub,
        name: token_data.claims.name,
    })
}

fn session_cookie(token: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build(("token", token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .max_age(max_age)
        .build()
}

/// Exchanges an externally issued token for an http-only session cookie so
/// browser clients do not have to hold the token in script-visible storage.
pub async fn create_session(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = validate_token(&payload.token, &app_state.config.jwt_secret)?;

    let cookie = session_cookie(payload.token, time::Duration::hours(24));
    let mut response = Json(UserResponse {
        subject: user.subject,
        name: user.name,
    })
    .into_response();
    response.headers_mut().insert(
        axum::http::header::SET_COOKIE,
        cookie
            .to_string()
            .parse()
            .map_err(|_| AppError::InternalServerError("invalid cookie header".to_string()))?,
    );
    Ok(response)
}

pub async fn destroy_session() -> Result<impl IntoResponse, AppError> {
    let cookie = session_cookie(String::new(), time::Duration::ZERO);
    let mut response = axum::http::StatusCode::NO_CONTENT.into_response();
    response.headers_mut().insert(
        axum::http::header::SET_COOKIE,
        cookie
            .to_string()
            .parse()
            .map_err(|_| AppError::InternalServerError("invalid cookie header".to_string()))?,
    );
    Ok(response)
}

pub async fn me(
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(UserResponse {
        subject: user.subject,
        name: user.name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_with_exp(secret: &str, exp_offset: Duration) -> String {
        let claims = Claims {
            sub: "admin@example.com".to_string(),
            name: Some("Admin".to_string()),
            exp: (Utc::now() + exp_offset).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_a_valid_token() {
        let token = token_with_exp("secret", Duration::hours(1));
        let user = validate_token(&token, "secret").unwrap();
        assert_eq!(user.subject, "admin@example.com");
        assert_eq!(user.name.as_deref(), Some("Admin"));
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let token = token_with_exp("secret", Duration::hours(1));
        assert!(validate_token(&token, "other-secret").is_err());

        let expired = token_with_exp("secret", Duration::hours(-1));
        assert!(validate_token(&expired, "secret").is_err());
    }
}
