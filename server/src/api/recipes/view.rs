//! Response shapes for recipes.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::users::view::{user_responses, UserResponse};
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{Recipe, User};
use crate::schema::{favorites, ingredients, recipe_ingredients, shopping_carts, users};

/// Compact recipe card used in favorites, cart and subscription responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeShort {
    pub id: Uuid,
    pub title: String,
    /// Absolute image URL
    pub image: String,
    pub preparation_time: i32,
}

impl RecipeShort {
    pub fn new(recipe: &Recipe, config: &Config) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            image: config.media_url(&recipe.image),
            preparation_time: recipe.preparation_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeIngredientResponse {
    /// Catalog ingredient ID
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeResponse {
    pub id: Uuid,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub title: String,
    /// Absolute image URL
    pub image: String,
    pub description: String,
    /// Minutes
    pub preparation_time: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recipe ids among `recipe_ids` that appear in `viewer`'s favorites and cart.
fn viewer_flags(
    conn: &mut PgConnection,
    viewer: Option<&User>,
    recipe_ids: &[Uuid],
) -> QueryResult<(HashSet<Uuid>, HashSet<Uuid>)> {
    let Some(viewer) = viewer else {
        return Ok((HashSet::new(), HashSet::new()));
    };

    let favorited: Vec<Uuid> = favorites::table
        .filter(favorites::user_id.eq(viewer.id))
        .filter(favorites::recipe_id.eq_any(recipe_ids))
        .select(favorites::recipe_id)
        .load(conn)?;

    let in_cart: Vec<Uuid> = shopping_carts::table
        .filter(shopping_carts::user_id.eq(viewer.id))
        .filter(shopping_carts::recipe_id.eq_any(recipe_ids))
        .select(shopping_carts::recipe_id)
        .load(conn)?;

    Ok((favorited.into_iter().collect(), in_cart.into_iter().collect()))
}

/// Builds full responses for a page of recipes with a fixed number of queries.
pub fn recipe_responses(
    conn: &mut PgConnection,
    config: &Config,
    viewer: Option<&User>,
    recipes: Vec<Recipe>,
) -> QueryResult<Vec<RecipeResponse>> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }

    let recipe_ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let author_ids: Vec<Uuid> = recipes.iter().map(|r| r.author_id).collect();

    let authors: Vec<User> = users::table
        .filter(users::id.eq_any(&author_ids))
        .select(User::as_select())
        .load(conn)?;
    let authors: HashMap<Uuid, UserResponse> = user_responses(conn, config, viewer, &authors)?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let rows: Vec<(Uuid, Uuid, String, String, i32)> = recipe_ingredients::table
        .inner_join(ingredients::table)
        .filter(recipe_ingredients::recipe_id.eq_any(&recipe_ids))
        .select((
            recipe_ingredients::recipe_id,
            ingredients::id,
            ingredients::name,
            recipe_ingredients::measurement_unit,
            recipe_ingredients::amount,
        ))
        .order(ingredients::name.asc())
        .load(conn)?;

    let mut by_recipe: HashMap<Uuid, Vec<RecipeIngredientResponse>> = HashMap::new();
    for (recipe_id, id, name, measurement_unit, amount) in rows {
        by_recipe
            .entry(recipe_id)
            .or_default()
            .push(RecipeIngredientResponse {
                id,
                name,
                measurement_unit,
                amount,
            });
    }

    let (favorited, in_cart) = viewer_flags(conn, viewer, &recipe_ids)?;

    recipes
        .into_iter()
        .map(|recipe| {
            let author = authors
                .get(&recipe.author_id)
                .cloned()
                .ok_or(diesel::result::Error::NotFound)?;
            Ok(RecipeResponse {
                id: recipe.id,
                author,
                ingredients: by_recipe.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: in_cart.contains(&recipe.id),
                image: config.media_url(&recipe.image),
                title: recipe.title,
                description: recipe.description,
                preparation_time: recipe.preparation_time,
                created_at: recipe.created_at,
                updated_at: recipe.updated_at,
            })
        })
        .collect()
}

pub fn recipe_response(
    conn: &mut PgConnection,
    config: &Config,
    viewer: Option<&User>,
    recipe: Recipe,
) -> Result<RecipeResponse, ApiError> {
    recipe_responses(conn, config, viewer, vec![recipe])?
        .pop()
        .ok_or(ApiError::NotFound("Recipe"))
}
