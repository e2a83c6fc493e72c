use crate::api::recipes::view::{recipe_response, RecipeResponse};
use crate::api::ErrorResponse;
use crate::api::extract::ApiJson;
use crate::auth::AuthUser;
use crate::composition::{self, IngredientAmount, RecipeFields, RecipeTarget};
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::media;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRecipeRequest {
    pub ingredients: Vec<IngredientAmount>,
    /// `data:image/<ext>;base64,<payload>`
    pub image: String,
    pub title: String,
    pub description: String,
    /// Minutes, 1..=32000
    pub preparation_time: i32,
}

#[utoipa::path(
    post,
    path = "/api/recipes",
    tag = "recipes",
    request_body = CreateRecipeRequest,
    responses(
        (status = 201, description = "Recipe created", body = RecipeResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_recipe(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiJson(req): ApiJson<CreateRecipeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = RecipeFields {
        title: &req.title,
        description: &req.description,
        preparation_time: req.preparation_time,
    };
    // Reject bad input before anything is written to disk
    composition::validate_fields(&fields)?;
    composition::validate_ingredient_amounts(&req.ingredients)?;

    let image =
        media::store_image_field(&config.media_root, media::RECIPE_IMAGES_DIR, &req.image).await?;

    let mut conn = get_conn(&pool)?;
    let saved = composition::save_recipe(
        &mut conn,
        RecipeTarget::New {
            author_id: user.id,
            image: &image,
        },
        fields,
        &req.ingredients,
    );

    let recipe_id = match saved {
        Ok(id) => id,
        Err(e) => {
            media::remove(&config.media_root, &image).await;
            return Err(e);
        }
    };

    tracing::info!(%recipe_id, author_id = %user.id, "recipe created");

    let recipe = super::ownership::find_recipe(&mut conn, recipe_id)?;
    let response = recipe_response(&mut conn, &config, Some(&user), recipe)?;
    Ok((StatusCode::CREATED, Json(response)))
}
