use serde::{Deserialize, Serialize};

pub mod push_models;

/// Token payload minted by the hosted authenticator. This server only
/// validates it, never issues one.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: usize,
}

/// Authenticated principal, passed to handlers as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub subject: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
