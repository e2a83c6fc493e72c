use crate::api::ErrorResponse;
use crate::auth::{delete_session, AuthUser, SessionToken};
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/api/auth/token/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Session ended"),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    AuthUser(user): AuthUser,
    SessionToken(token): SessionToken,
    State(pool): State<Arc<DbPool>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    delete_session(&mut conn, &token)?;
    tracing::info!(user_id = %user.id, "user logged out");
    Ok(StatusCode::NO_CONTENT)
}
