use crate::api::users::view::{user_response, UserResponse};
use crate::api::ErrorResponse;
use crate::api::extract::ApiPath;
use crate::auth::MaybeAuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::models::User;
use crate::schema::users;
use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn get_user(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;

    let user: User = users::table
        .find(id)
        .select(User::as_select())
        .first(&mut conn)
        .optional()?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(user_response(&mut conn, &config, viewer.as_ref(), &user)?))
}
