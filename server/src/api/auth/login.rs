use crate::api::ErrorResponse;
use crate::api::extract::ApiJson;
use crate::auth::{create_session, verify_password};
use crate::db::{get_conn, DbPool};
use crate::error::{ApiError, ValidationError};
use crate::models::User;
use crate::raw_sql::lower;
use crate::schema::users;
use axum::{extract::State, response::IntoResponse, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub auth_token: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/token/login",
    tag = "auth",
    request_body(content = LoginRequest, example = json!({"email": "cook@example.com", "password": "password"})),
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(pool): State<Arc<DbPool>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;

    let user: Option<User> = users::table
        .filter(lower(users::email).eq(lower(req.email.trim())))
        .select(User::as_select())
        .first(&mut conn)
        .optional()?;

    // Same error for unknown email and wrong password
    let user = match user {
        Some(u) if verify_password(&req.password, &u.password_hash) => u,
        _ => return Err(ValidationError::InvalidCredentials.into()),
    };

    let auth_token = create_session(&mut conn, user.id)?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(LoginResponse { auth_token }))
}
