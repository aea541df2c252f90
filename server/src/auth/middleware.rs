//! Authentication extractor.
//!
//! The bearer token names the user. With `AUTH_SECRET` configured the token
//! must be `user_id:secret`; without it the whole token is the user id.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::config::Config;
use crate::error::AppError;
use crate::AppState;

/// Authenticated user extracted from request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

impl AuthUser {
    /// Resolve a raw token (without the `Bearer ` prefix).
    pub fn from_token(token: &str, config: &Config) -> Result<Self, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let user_id = match &config.auth_secret {
            Some(secret) => match token.rsplit_once(':') {
                Some((user_id, given)) if given == secret => user_id,
                _ => return Err(AppError::Unauthorized),
            },
            None => token,
        };

        if !valid_user_id(user_id) {
            return Err(AppError::Unauthorized);
        }

        Ok(AuthUser {
            user_id: user_id.to_string(),
        })
    }

    /// Extract from an `Authorization: Bearer` header value.
    pub fn from_header(header: Option<&str>, config: &Config) -> Result<Self, AppError> {
        match header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) => Self::from_token(token, config),
            None => Err(AppError::Unauthorized),
        }
    }
}

fn valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= 128
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        AuthUser::from_header(header, &state.config)
    }
}
