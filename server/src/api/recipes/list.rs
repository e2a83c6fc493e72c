use crate::api::recipes::view::{recipe_responses, RecipeResponse};
use crate::api::{page_bounds, page_total, ErrorResponse, PaginationMetadata};
use crate::api::extract::ApiQuery;
use crate::auth::MaybeAuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::models::{Recipe, User};
use crate::raw_sql::{contains_pattern, count_over};
use crate::schema::{favorites, recipes, shopping_carts};
use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListRecipesParams {
    /// Number of items to return (default: 20, max: 1000)
    pub limit: Option<i64>,
    /// Number of items to skip (default: 0)
    pub offset: Option<i64>,
    /// Only recipes by this author
    pub author: Option<Uuid>,
    /// `1`/`true` for the caller's favorites only, `0`/`false` to exclude them
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_favorited: Option<bool>,
    /// `1`/`true` for recipes in the caller's cart only, `0`/`false` to exclude them
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_in_shopping_cart: Option<bool>,
    /// Case-insensitive title search
    pub q: Option<String>,
}

impl ListRecipesParams {
    /// True when a filter asks for the caller's own favorites or cart.
    /// Anonymous callers have neither, so the page is empty.
    fn needs_viewer(&self) -> bool {
        self.is_favorited == Some(true) || self.is_in_shopping_cart == Some(true)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|v| {
        parse_flag(&v).ok_or_else(|| de::Error::custom(format!("expected 0, 1, true or false, got {v:?}")))
    })
    .transpose()
}

/// Recipes matching the author, title and viewer-relative filters.
fn filtered_recipes<'a>(
    params: &ListRecipesParams,
    viewer: Option<&User>,
    title_pattern: Option<&'a str>,
) -> recipes::BoxedQuery<'a, Pg> {
    let mut query = recipes::table.into_boxed();

    if let Some(author) = params.author {
        query = query.filter(recipes::author_id.eq(author));
    }

    if let Some(pattern) = title_pattern {
        query = query.filter(recipes::title.ilike(pattern));
    }

    if let Some(viewer) = viewer {
        let favorited = favorites::table
            .filter(favorites::user_id.eq(viewer.id))
            .select(favorites::recipe_id);
        match params.is_favorited {
            Some(true) => query = query.filter(recipes::id.eq_any(favorited)),
            Some(false) => query = query.filter(diesel::dsl::not(recipes::id.eq_any(favorited))),
            None => {}
        }

        let in_cart = shopping_carts::table
            .filter(shopping_carts::user_id.eq(viewer.id))
            .select(shopping_carts::recipe_id);
        match params.is_in_shopping_cart {
            Some(true) => query = query.filter(recipes::id.eq_any(in_cart)),
            Some(false) => query = query.filter(diesel::dsl::not(recipes::id.eq_any(in_cart))),
            None => {}
        }
    }

    query
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListRecipesResponse {
    pub recipes: Vec<RecipeResponse>,
    pub pagination: PaginationMetadata,
}

#[utoipa::path(
    get,
    path = "/api/recipes",
    tag = "recipes",
    params(ListRecipesParams),
    responses(
        (status = 200, description = "Recipes, newest first", body = ListRecipesResponse),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    )
)]
pub async fn list_recipes(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
    ApiQuery(params): ApiQuery<ListRecipesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = page_bounds(params.limit, params.offset);
    let pagination = PaginationMetadata {
        total: 0,
        limit,
        offset,
    };

    if viewer.is_none() && params.needs_viewer() {
        return Ok(Json(ListRecipesResponse {
            recipes: Vec::new(),
            pagination,
        }));
    }

    let title_pattern = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(contains_pattern);

    let mut conn = get_conn(&pool)?;
    let rows: Vec<(Recipe, i64)> = filtered_recipes(&params, viewer.as_ref(), title_pattern.as_deref())
        .select((Recipe::as_select(), count_over()))
        .order((recipes::created_at.desc(), recipes::id.desc()))
        .limit(limit)
        .offset(offset)
        .load(&mut conn)?;

    let total = page_total(rows.first().map(|(_, total)| *total), offset, || {
        filtered_recipes(&params, viewer.as_ref(), title_pattern.as_deref())
            .count()
            .get_result(&mut conn)
    })?;
    let page: Vec<Recipe> = rows.into_iter().map(|(r, _)| r).collect();

    Ok(Json(ListRecipesResponse {
        recipes: recipe_responses(&mut conn, &config, viewer.as_ref(), page)?,
        pagination: PaginationMetadata { total, ..pagination },
    }))
}
