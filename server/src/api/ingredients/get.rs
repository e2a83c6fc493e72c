use crate::api::ErrorResponse;
use crate::api::extract::ApiPath;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::models::Ingredient;
use crate::schema::ingredients;
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
    path = "/api/ingredients/{id}",
    tag = "ingredients",
    params(
        ("id" = Uuid, Path, description = "Ingredient ID")
    ),
    responses(
        (status = 200, description = "Catalog entry", body = Ingredient),
        (status = 404, description = "Ingredient not found", body = ErrorResponse)
    )
)]
pub async fn get_ingredient(
    State(pool): State<Arc<DbPool>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;

    let ingredient: Ingredient = ingredients::table
        .find(id)
        .select(Ingredient::as_select())
        .first(&mut conn)
        .optional()?
        .ok_or(ApiError::NotFound("Ingredient"))?;

    Ok(Json(ingredient))
}
