use crate::api::recipes::ownership::find_recipe;
use crate::api::recipes::view::RecipeShort;
use crate::api::ErrorResponse;
use crate::api::extract::ApiPath;
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::memberships;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/recipes/{id}/favorite",
    tag = "recipes",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 201, description = "Added to favorites", body = RecipeShort),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse),
        (status = 409, description = "Already in favorites", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn add_favorite(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    memberships::add_favorite(&mut conn, user.id, id)?;
    let recipe = find_recipe(&mut conn, id)?;
    Ok((StatusCode::CREATED, Json(RecipeShort::new(&recipe, &config))))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/favorite",
    tag = "recipes",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Removed from favorites"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Recipe not found or not in favorites", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn remove_favorite(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    memberships::remove_favorite(&mut conn, user.id, id)?;
    Ok(StatusCode::NO_CONTENT)
}
