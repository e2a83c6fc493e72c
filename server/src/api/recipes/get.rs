use crate::api::recipes::ownership::find_recipe;
use crate::api::recipes::view::{recipe_response, RecipeResponse};
use crate::api::ErrorResponse;
use crate::api::extract::ApiPath;
use crate::auth::MaybeAuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/recipes/{id}",
    tag = "recipes",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 200, description = "Recipe details", body = RecipeResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse)
    )
)]
pub async fn get_recipe(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    let recipe = find_recipe(&mut conn, id)?;
    Ok(Json(recipe_response(&mut conn, &config, viewer.as_ref(), recipe)?))
}
