use crate::api::ErrorResponse;
use crate::db::DbPool;
use crate::models::User;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use thiserror::Error;

use super::db::get_user_from_token;

/// Extractor that validates the Authorization header and provides the authenticated user.
///
/// Use this in any handler that requires authentication:
/// ```ignore
/// async fn my_handler(AuthUser(user): AuthUser) -> impl IntoResponse {
///     // user is the authenticated User
/// }
/// ```
pub struct AuthUser(pub User);

/// Like [`AuthUser`], but lets anonymous requests through as `None`.
/// A header that is present but invalid is still rejected.
pub struct MaybeAuthUser(pub Option<User>);

/// The raw session token of an authenticated request, for logout.
pub struct SessionToken(pub String);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header")]
    InvalidHeader,
    #[error("Invalid Authorization header format")]
    InvalidFormat,
    #[error("Invalid or expired token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Accepts both `Token <t>` and `Bearer <t>` schemes.
pub fn parse_authorization(value: &str) -> Result<&str, AuthError> {
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("Token "))
        .ok_or(AuthError::InvalidFormat)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidFormat);
    }

    Ok(token)
}

fn header_token(parts: &Parts) -> Result<Option<String>, AuthError> {
    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header.to_str().map_err(|_| AuthError::InvalidHeader)?;
    parse_authorization(auth_str).map(|t| Some(t.to_string()))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<DbPool>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = Arc::<DbPool>::from_ref(state);

        let token = header_token(parts)?.ok_or(AuthError::MissingHeader)?;

        let user = get_user_from_token(&pool, &token)
            .await
            .ok_or(AuthError::InvalidToken)?;

        Ok(AuthUser(user))
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    Arc<DbPool>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = header_token(parts)? else {
            return Ok(MaybeAuthUser(None));
        };

        let pool = Arc::<DbPool>::from_ref(state);
        let user = get_user_from_token(&pool, &token)
            .await
            .ok_or(AuthError::InvalidToken)?;

        Ok(MaybeAuthUser(Some(user)))
    }
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_token(parts)?
            .map(SessionToken)
            .ok_or(AuthError::MissingHeader)
    }
}
