use crate::api::ErrorResponse;
use crate::api::extract::ApiJson;
use crate::auth::{hash_password, verify_password, AuthUser};
use crate::db::{get_conn, DbPool};
use crate::error::{ApiError, ValidationError};
use crate::schema::users;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[utoipa::path(
    post,
    path = "/api/users/set_password",
    tag = "users",
    request_body = SetPasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or blank new password", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_password(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    ApiJson(req): ApiJson<SetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ValidationError::field("current_password", "Current password is incorrect").into());
    }
    if req.new_password.is_empty() {
        return Err(ValidationError::field("new_password", "This field may not be blank").into());
    }

    let password_hash = hash_password(&req.new_password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?;

    let mut conn = get_conn(&pool)?;
    diesel::update(users::table.find(user.id))
        .set((
            users::password_hash.eq(&password_hash),
            users::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

    tracing::info!(user_id = %user.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
