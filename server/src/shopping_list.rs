//! Consolidated shopping list for everything in a user's cart.
//!
//! Always computed from the live `recipe_ingredients` rows of the recipes in
//! the cart. Cart snapshots are display data and are never read here.

use std::collections::BTreeMap;

use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::schema::{ingredients, recipe_ingredients, shopping_carts};

pub const HEADER: &str = "Shopping list:";

/// One ingredient use in one recipe, as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientLine {
    pub name: String,
    pub unit: String,
    pub amount: i32,
}

impl From<(String, String, i32)> for IngredientLine {
    fn from((name, unit, amount): (String, String, i32)) -> Self {
        Self { name, unit, amount }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShoppingListEntry {
    pub name: String,
    pub total_amount: i64,
    pub unit: String,
    /// 1-based position in the sorted list.
    pub rank: usize,
}

/// Groups lines by (name, unit), sums amounts, and orders by name then unit.
///
/// Grouping is by name and unit only: two catalog ingredients that share
/// both are merged into one entry.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingListEntry>
where
    I: IntoIterator<Item = IngredientLine>,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *totals.entry((line.name, line.unit)).or_insert(0) += i64::from(line.amount);
    }

    totals
        .into_iter()
        .enumerate()
        .map(|(index, ((name, unit), total_amount))| ShoppingListEntry {
            name,
            total_amount,
            unit,
            rank: index + 1,
        })
        .collect()
}

/// Plain-text download body: header, blank line, one line per entry.
pub fn render(entries: &[ShoppingListEntry]) -> String {
    let mut out = format!("{HEADER}\n\n");
    for entry in entries {
        out.push_str(&format!(
            "{}. {} - {} {}\n",
            entry.rank, entry.name, entry.total_amount, entry.unit
        ));
    }
    out
}

pub fn cart_recipe_ids(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<Uuid>> {
    shopping_carts::table
        .filter(shopping_carts::user_id.eq(user_id))
        .select(shopping_carts::recipe_id)
        .load(conn)
}

/// Aggregated list for `user_id`, or `EmptyCart` when the cart holds nothing.
pub fn build_shopping_list(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Vec<ShoppingListEntry>, ApiError> {
    let recipe_ids = cart_recipe_ids(conn, user_id)?;
    if recipe_ids.is_empty() {
        return Err(ApiError::EmptyCart);
    }

    let rows: Vec<(String, String, i32)> = recipe_ingredients::table
        .inner_join(ingredients::table)
        .filter(recipe_ingredients::recipe_id.eq_any(&recipe_ids))
        .select((
            ingredients::name,
            ingredients::measurement_unit,
            recipe_ingredients::amount,
        ))
        .load(conn)?;

    tracing::debug!(
        %user_id,
        recipes = recipe_ids.len(),
        rows = rows.len(),
        "aggregating shopping list"
    );

    Ok(aggregate(rows.into_iter().map(IngredientLine::from)))
}
