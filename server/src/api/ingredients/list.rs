use crate::api::ErrorResponse;
use crate::api::extract::ApiQuery;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::models::Ingredient;
use crate::raw_sql::prefix_pattern;
use crate::schema::ingredients;
use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListIngredientsParams {
    /// Case-insensitive name prefix
    pub name: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/ingredients",
    tag = "ingredients",
    params(ListIngredientsParams),
    responses(
        (status = 200, description = "Catalog entries ordered by name", body = Vec<Ingredient>),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
pub async fn list_ingredients(
    State(pool): State<Arc<DbPool>>,
    ApiQuery(params): ApiQuery<ListIngredientsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;

    let mut query = ingredients::table.into_boxed();
    if let Some(name) = params.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        query = query.filter(ingredients::name.ilike(prefix_pattern(name)));
    }

    let found: Vec<Ingredient> = query
        .order((ingredients::name.asc(), ingredients::measurement_unit.asc()))
        .select(Ingredient::as_select())
        .load(&mut conn)?;

    Ok(Json(found))
}
