use crate::api::ErrorResponse;
use crate::api::extract::ApiJson;
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::media;
use crate::schema::users;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AvatarRequest {
    /// `data:image/<ext>;base64,<payload>`
    pub avatar: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvatarResponse {
    pub avatar: String,
}

#[utoipa::path(
    put,
    path = "/api/users/me/avatar",
    tag = "users",
    request_body = AvatarRequest,
    responses(
        (status = 200, description = "Avatar stored", body = AvatarResponse),
        (status = 400, description = "Invalid image", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn put_avatar(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiJson(req): ApiJson<AvatarRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let stored =
        media::store_image_field(&config.media_root, media::AVATARS_DIR, &req.avatar).await?;

    let mut conn = get_conn(&pool)?;
    let updated = diesel::update(users::table.find(user.id))
        .set((users::avatar.eq(&stored), users::updated_at.eq(Utc::now())))
        .execute(&mut conn);

    if let Err(e) = updated {
        media::remove(&config.media_root, &stored).await;
        return Err(e.into());
    }

    if let Some(old) = user.avatar.as_deref() {
        media::remove(&config.media_root, old).await;
    }

    Ok(Json(AvatarResponse {
        avatar: config.media_url(&stored),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/users/me/avatar",
    tag = "users",
    responses(
        (status = 204, description = "Avatar removed"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "No avatar set", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_avatar(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
) -> Result<impl IntoResponse, ApiError> {
    let old = user.avatar.ok_or(ApiError::NotFound("Avatar"))?;

    let mut conn = get_conn(&pool)?;
    diesel::update(users::table.find(user.id))
        .set((
            users::avatar.eq(None::<String>),
            users::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

    media::remove(&config.media_root, &old).await;

    Ok(StatusCode::NO_CONTENT)
}
