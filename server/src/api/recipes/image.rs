use crate::api::recipes::ownership::find_editable;
use crate::api::ErrorResponse;
use crate::api::extract::ApiPath;
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::{ApiError, ValidationError};
use crate::media::{self, processing::MAX_FILE_SIZE};
use crate::schema::recipes;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeImageResponse {
    /// Absolute URL of the new image
    pub image: String,
}

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct RecipeImageUpload {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    tracing::warn!("Multipart read error: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::InvalidImage("File too large. Maximum size is 2MB".to_string()).into()
    } else {
        ValidationError::InvalidImage(format!("Failed to read multipart data: {}", e.body_text()))
            .into()
    }
}

#[utoipa::path(
    put,
    path = "/api/recipes/{id}/image",
    tag = "recipes",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    request_body(content_type = "multipart/form-data", content = RecipeImageUpload),
    responses(
        (status = 200, description = "Image replaced", body = RecipeImageResponse),
        (status = 400, description = "Invalid image", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_image(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiPath(id): ApiPath<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    let recipe = find_editable(&mut conn, &user, id)?;

    let field = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
        .ok_or_else(|| ValidationError::InvalidImage("No file provided".to_string()))?;
    let data = field.bytes().await.map_err(multipart_error)?;

    if data.len() > MAX_FILE_SIZE {
        return Err(ValidationError::InvalidImage(format!(
            "File too large. Maximum size is {} bytes",
            MAX_FILE_SIZE
        ))
        .into());
    }

    let stored = media::store_bytes(&config.media_root, media::RECIPE_IMAGES_DIR, &data).await?;

    let updated = diesel::update(recipes::table.find(recipe.id))
        .set((recipes::image.eq(&stored), recipes::updated_at.eq(Utc::now())))
        .execute(&mut conn);
    if let Err(e) = updated {
        media::remove(&config.media_root, &stored).await;
        return Err(e.into());
    }
    media::remove(&config.media_root, &recipe.image).await;

    tracing::info!(recipe_id = %recipe.id, bytes = data.len(), "recipe image replaced");

    Ok(Json(RecipeImageResponse {
        image: config.media_url(&stored),
    }))
}
