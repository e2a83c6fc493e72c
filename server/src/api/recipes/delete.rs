use crate::api::recipes::ownership::find_editable;
use crate::api::ErrorResponse;
use crate::api::extract::ApiPath;
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::media;
use crate::schema::recipes;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}",
    tag = "recipes",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_recipe(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    let recipe = find_editable(&mut conn, &user, id)?;

    // Ingredients, favorites and cart entries go with it (ON DELETE CASCADE)
    diesel::delete(recipes::table.find(recipe.id)).execute(&mut conn)?;
    media::remove(&config.media_root, &recipe.image).await;

    tracing::info!(recipe_id = %recipe.id, user_id = %user.id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}
