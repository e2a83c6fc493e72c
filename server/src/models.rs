use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::sessions)]
pub struct NewSession<'a> {
    pub user_id: Uuid,
    pub token_hash: &'a str,
    pub expires_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Debug, Clone, Serialize, utoipa::ToSchema)]
#[diesel(table_name = crate::schema::ingredients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Insertable, Debug, Clone, Deserialize)]
#[diesel(table_name = crate::schema::ingredients)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Queryable, QueryableByName, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::recipes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub image: String,
    pub description: String,
    pub preparation_time: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::recipes)]
pub struct NewRecipe<'a> {
    pub author_id: Uuid,
    pub title: &'a str,
    pub image: &'a str,
    pub description: &'a str,
    pub preparation_time: i32,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::recipes)]
pub struct RecipeChanges<'a> {
    pub title: &'a str,
    pub image: Option<&'a str>,
    pub description: &'a str,
    pub preparation_time: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = crate::schema::recipe_ingredients)]
pub struct NewRecipeIngredient<'a> {
    pub recipe_id: Uuid,
    pub ingredient_id: Uuid,
    pub amount: i32,
    pub measurement_unit: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::favorites)]
pub struct NewFavorite {
    pub user_id: Uuid,
    pub recipe_id: Uuid,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::shopping_carts)]
pub struct NewShoppingCartEntry {
    pub user_id: Uuid,
    pub recipe_id: Uuid,
    pub ingredients_snapshot: serde_json::Value,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::follows)]
pub struct NewFollow {
    pub user_id: Uuid,
    pub author_id: Uuid,
}

/// One line of a cart entry's frozen ingredient list, stored as JSONB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SnapshotLine {
    pub name: String,
    pub unit: String,
    pub amount: i32,
}
