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
    path = "/api/recipes/{id}/shopping_cart",
    tag = "recipes",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 201, description = "Added to the shopping cart", body = RecipeShort),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Recipe not found", body = ErrorResponse),
        (status = 409, description = "Already in the shopping cart", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn add_to_cart(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    memberships::add_to_cart(&mut conn, user.id, id)?;
    let recipe = find_recipe(&mut conn, id)?;
    Ok((StatusCode::CREATED, Json(RecipeShort::new(&recipe, &config))))
}

#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/shopping_cart",
    tag = "recipes",
    params(
        ("id" = Uuid, Path, description = "Recipe ID")
    ),
    responses(
        (status = 204, description = "Removed from the shopping cart"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Recipe not found or not in the shopping cart", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn remove_from_cart(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;
    memberships::remove_from_cart(&mut conn, user.id, id)?;
    Ok(StatusCode::NO_CONTENT)
}
