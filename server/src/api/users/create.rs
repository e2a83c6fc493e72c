use crate::api::ErrorResponse;
use crate::api::extract::ApiJson;
use crate::auth::hash_password;
use crate::db::{get_conn, DbPool};
use crate::error::{conflict_on_unique, ApiError, ValidationError};
use crate::models::{NewUser, User};
use crate::schema::users;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_NAME_LEN: usize = 150;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignupResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Letters, digits and `_ . @ + -`.
fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::field(field, "This field may not be blank"));
    }
    if value.chars().count() > max {
        return Err(ValidationError::field(
            field,
            format!("Must be at most {max} characters"),
        ));
    }
    Ok(())
}

pub fn validate_signup(req: &SignupRequest) -> Result<(), ValidationError> {
    check_length("email", &req.email, MAX_EMAIL_LEN)?;
    match req.email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => return Err(ValidationError::field("email", "Enter a valid email address")),
    }

    check_length("username", &req.username, MAX_NAME_LEN)?;
    if !is_valid_username(&req.username) {
        return Err(ValidationError::field(
            "username",
            "Username may contain only letters, digits and @/./+/-/_",
        ));
    }

    check_length("first_name", &req.first_name, MAX_NAME_LEN)?;
    check_length("last_name", &req.last_name, MAX_NAME_LEN)?;

    if req.password.is_empty() {
        return Err(ValidationError::field("password", "This field may not be blank"));
    }

    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = SignupResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email or username already taken", body = ErrorResponse)
    )
)]
pub async fn create_user(
    State(pool): State<Arc<DbPool>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_signup(&req)?;

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?;

    let mut conn = get_conn(&pool)?;

    let user: User = diesel::insert_into(users::table)
        .values(&NewUser {
            email: req.email.trim(),
            username: &req.username,
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            password_hash: &password_hash,
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
        .map_err(|e| conflict_on_unique(e, "A user with this email or username already exists"))?;

    tracing::info!(user_id = %user.id, username = %user.username, "user signed up");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }),
    ))
}
