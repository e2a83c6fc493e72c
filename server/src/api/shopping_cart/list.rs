use crate::api::recipes::view::RecipeShort;
use crate::api::ErrorResponse;
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{get_conn, DbPool};
use crate::error::ApiError;
use crate::models::{Recipe, SnapshotLine};
use crate::schema::{recipes, shopping_carts};
use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartEntry {
    pub recipe: RecipeShort,
    /// Ingredients as they were when the recipe was added to the cart
    pub ingredients: Vec<SnapshotLine>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartResponse {
    pub entries: Vec<CartEntry>,
    pub count: usize,
}

/// Reads a stored snapshot. Rows that do not parse show as empty rather
/// than failing the whole cart.
fn decode_snapshot(value: serde_json::Value) -> Vec<SnapshotLine> {
    serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "unreadable cart snapshot");
        Vec::new()
    })
}

#[utoipa::path(
    get,
    path = "/api/shopping_cart",
    tag = "shopping_cart",
    responses(
        (status = 200, description = "Cart entries, most recently added first", body = CartResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_cart(
    AuthUser(user): AuthUser,
    State(pool): State<Arc<DbPool>>,
    State(config): State<Arc<Config>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = get_conn(&pool)?;

    let rows: Vec<(Recipe, serde_json::Value, DateTime<Utc>)> = shopping_carts::table
        .inner_join(recipes::table)
        .filter(shopping_carts::user_id.eq(user.id))
        .select((
            Recipe::as_select(),
            shopping_carts::ingredients_snapshot,
            shopping_carts::added_at,
        ))
        .order(shopping_carts::added_at.desc())
        .load(&mut conn)?;

    let entries: Vec<CartEntry> = rows
        .into_iter()
        .map(|(recipe, snapshot, added_at)| CartEntry {
            recipe: RecipeShort::new(&recipe, &config),
            ingredients: decode_snapshot(snapshot),
            added_at,
        })
        .collect();

    Ok(Json(CartResponse {
        count: entries.len(),
        entries,
    }))
}
