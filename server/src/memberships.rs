//! Add/remove operations for favorites, shopping cart entries and follows.
//!
//! Adding a membership that already exists is a conflict, removing one that
//! does not exist is not-found. The existence checks before inserts only give
//! a nicer error early; the unique constraints on each table decide races.

use diesel::dsl::exists;
use diesel::prelude::*;
use uuid::Uuid;

use crate::error::{conflict_on_unique, ApiError, ValidationError};
use crate::models::{NewFavorite, NewFollow, NewShoppingCartEntry, SnapshotLine};
use crate::schema::{favorites, follows, ingredients, recipe_ingredients, recipes, shopping_carts, users};

const ALREADY_FAVORITED: &str = "Recipe is already in favorites";
const ALREADY_IN_CART: &str = "Recipe is already in the shopping cart";
const ALREADY_FOLLOWING: &str = "You are already subscribed to this user";

fn ensure_recipe_exists(conn: &mut PgConnection, recipe_id: Uuid) -> Result<(), ApiError> {
    let found: bool = diesel::select(exists(recipes::table.find(recipe_id))).get_result(conn)?;
    if found {
        Ok(())
    } else {
        Err(ApiError::NotFound("Recipe"))
    }
}

fn ensure_user_exists(conn: &mut PgConnection, user_id: Uuid) -> Result<(), ApiError> {
    let found: bool = diesel::select(exists(users::table.find(user_id))).get_result(conn)?;
    if found {
        Ok(())
    } else {
        Err(ApiError::NotFound("User"))
    }
}

fn reject_existing(present: bool, message: &str) -> Result<(), ApiError> {
    if present {
        Err(ApiError::conflict(message))
    } else {
        Ok(())
    }
}

fn expect_removed(deleted: usize, what: &'static str) -> Result<(), ApiError> {
    if deleted == 0 {
        Err(ApiError::NotFound(what))
    } else {
        Ok(())
    }
}

pub fn is_favorited(conn: &mut PgConnection, user_id: Uuid, recipe_id: Uuid) -> QueryResult<bool> {
    diesel::select(exists(
        favorites::table
            .filter(favorites::user_id.eq(user_id))
            .filter(favorites::recipe_id.eq(recipe_id)),
    ))
    .get_result(conn)
}

pub fn is_in_cart(conn: &mut PgConnection, user_id: Uuid, recipe_id: Uuid) -> QueryResult<bool> {
    diesel::select(exists(
        shopping_carts::table
            .filter(shopping_carts::user_id.eq(user_id))
            .filter(shopping_carts::recipe_id.eq(recipe_id)),
    ))
    .get_result(conn)
}

pub fn is_following(conn: &mut PgConnection, user_id: Uuid, author_id: Uuid) -> QueryResult<bool> {
    diesel::select(exists(
        follows::table
            .filter(follows::user_id.eq(user_id))
            .filter(follows::author_id.eq(author_id)),
    ))
    .get_result(conn)
}

pub fn add_favorite(conn: &mut PgConnection, user_id: Uuid, recipe_id: Uuid) -> Result<(), ApiError> {
    ensure_recipe_exists(conn, recipe_id)?;
    reject_existing(is_favorited(conn, user_id, recipe_id)?, ALREADY_FAVORITED)?;

    diesel::insert_into(favorites::table)
        .values(&NewFavorite { user_id, recipe_id })
        .execute(conn)
        .map_err(|e| conflict_on_unique(e, ALREADY_FAVORITED))?;

    Ok(())
}

pub fn remove_favorite(conn: &mut PgConnection, user_id: Uuid, recipe_id: Uuid) -> Result<(), ApiError> {
    ensure_recipe_exists(conn, recipe_id)?;
    let deleted = diesel::delete(
        favorites::table
            .filter(favorites::user_id.eq(user_id))
            .filter(favorites::recipe_id.eq(recipe_id)),
    )
    .execute(conn)?;
    expect_removed(deleted, "Favorite")
}

/// The recipe's current ingredient list, frozen into a cart entry.
pub fn snapshot_lines(conn: &mut PgConnection, recipe_id: Uuid) -> QueryResult<Vec<SnapshotLine>> {
    let rows: Vec<(String, String, i32)> = recipe_ingredients::table
        .inner_join(ingredients::table)
        .filter(recipe_ingredients::recipe_id.eq(recipe_id))
        .select((
            ingredients::name,
            ingredients::measurement_unit,
            recipe_ingredients::amount,
        ))
        .order(ingredients::name.asc())
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(name, unit, amount)| SnapshotLine { name, unit, amount })
        .collect())
}

pub fn add_to_cart(conn: &mut PgConnection, user_id: Uuid, recipe_id: Uuid) -> Result<(), ApiError> {
    conn.transaction::<_, ApiError, _>(|conn| {
        ensure_recipe_exists(conn, recipe_id)?;
        reject_existing(is_in_cart(conn, user_id, recipe_id)?, ALREADY_IN_CART)?;

        let snapshot = serde_json::to_value(snapshot_lines(conn, recipe_id)?)
            .map_err(|e| ApiError::Internal(format!("Failed to encode snapshot: {e}")))?;

        diesel::insert_into(shopping_carts::table)
            .values(&NewShoppingCartEntry {
                user_id,
                recipe_id,
                ingredients_snapshot: snapshot,
            })
            .execute(conn)
            .map_err(|e| conflict_on_unique(e, ALREADY_IN_CART))?;

        Ok(())
    })
}

pub fn remove_from_cart(conn: &mut PgConnection, user_id: Uuid, recipe_id: Uuid) -> Result<(), ApiError> {
    ensure_recipe_exists(conn, recipe_id)?;
    let deleted = diesel::delete(
        shopping_carts::table
            .filter(shopping_carts::user_id.eq(user_id))
            .filter(shopping_carts::recipe_id.eq(recipe_id)),
    )
    .execute(conn)?;
    expect_removed(deleted, "Shopping cart entry")
}

pub fn check_follow_target(user_id: Uuid, author_id: Uuid) -> Result<(), ValidationError> {
    if user_id == author_id {
        return Err(ValidationError::SelfFollow);
    }
    Ok(())
}

pub fn follow(conn: &mut PgConnection, user_id: Uuid, author_id: Uuid) -> Result<(), ApiError> {
    ensure_user_exists(conn, author_id)?;
    check_follow_target(user_id, author_id)?;
    reject_existing(is_following(conn, user_id, author_id)?, ALREADY_FOLLOWING)?;

    diesel::insert_into(follows::table)
        .values(&NewFollow { user_id, author_id })
        .execute(conn)
        .map_err(|e| conflict_on_unique(e, ALREADY_FOLLOWING))?;

    Ok(())
}

pub fn unfollow(conn: &mut PgConnection, user_id: Uuid, author_id: Uuid) -> Result<(), ApiError> {
    ensure_user_exists(conn, author_id)?;
    let deleted = diesel::delete(
        follows::table
            .filter(follows::user_id.eq(user_id))
            .filter(follows::author_id.eq(author_id)),
    )
    .execute(conn)?;
    expect_removed(deleted, "Subscription")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{save_recipe, IngredientAmount, RecipeFields, RecipeTarget};
    use crate::db::testing;
    use axum::http::StatusCode;

    fn recipe_with_salt(conn: &mut PgConnection, author_id: Uuid) -> Uuid {
        let salt = testing::ingredient(conn, "Salt", "g");
        save_recipe(
            conn,
            RecipeTarget::New {
                author_id,
                image: "recipes/images/soup.png",
            },
            RecipeFields {
                title: "Soup",
                description: "Boil.",
                preparation_time: 30,
            },
            &[IngredientAmount {
                id: salt.id,
                amount: 5,
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_existing_membership_is_conflict() {
        let err = reject_existing(true, ALREADY_IN_CART).unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(m) if m == ALREADY_IN_CART));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(reject_existing(false, ALREADY_IN_CART).is_ok());
    }

    #[test]
    fn test_cart_added_twice_is_conflict() {
        let Some(mut conn) = testing::conn() else {
            return;
        };
        let cook = testing::user(&mut conn, "cook");
        let recipe_id = recipe_with_salt(&mut conn, cook.id);

        add_to_cart(&mut conn, cook.id, recipe_id).unwrap();
        let err = add_to_cart(&mut conn, cook.id, recipe_id).unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(m) if m == ALREADY_IN_CART));

        let snapshot: serde_json::Value = shopping_carts::table
            .filter(shopping_carts::user_id.eq(cook.id))
            .select(shopping_carts::ingredients_snapshot)
            .first(&mut conn)
            .unwrap();
        assert_eq!(
            snapshot,
            serde_json::json!([{"name": "Salt", "unit": "g", "amount": 5}])
        );
    }

    #[test]
    fn test_favorite_and_follow_twice_are_conflicts() {
        let Some(mut conn) = testing::conn() else {
            return;
        };
        let cook = testing::user(&mut conn, "cook");
        let fan = testing::user(&mut conn, "fan");
        let recipe_id = recipe_with_salt(&mut conn, cook.id);

        add_favorite(&mut conn, fan.id, recipe_id).unwrap();
        assert!(matches!(
            add_favorite(&mut conn, fan.id, recipe_id),
            Err(ApiError::Conflict(_))
        ));

        follow(&mut conn, fan.id, cook.id).unwrap();
        assert!(matches!(
            follow(&mut conn, fan.id, cook.id),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            follow(&mut conn, fan.id, fan.id),
            Err(ApiError::Validation(ValidationError::SelfFollow))
        ));
    }

    #[test]
    fn test_removing_absent_membership_is_not_found() {
        let Some(mut conn) = testing::conn() else {
            return;
        };
        let cook = testing::user(&mut conn, "cook");
        let recipe_id = recipe_with_salt(&mut conn, cook.id);

        assert!(matches!(
            remove_from_cart(&mut conn, cook.id, recipe_id),
            Err(ApiError::NotFound("Shopping cart entry"))
        ));
        assert!(matches!(
            remove_favorite(&mut conn, cook.id, Uuid::new_v4()),
            Err(ApiError::NotFound("Recipe"))
        ));
    }

    #[test]
    fn test_unique_violation_from_postgres_is_conflict() {
        let Some(mut conn) = testing::conn() else {
            return;
        };
        let cook = testing::user(&mut conn, "cook");
        let recipe_id = recipe_with_salt(&mut conn, cook.id);
        add_favorite(&mut conn, cook.id, recipe_id).unwrap();

        // Skips the existence check, as a concurrent request would
        let err = conn
            .transaction::<_, ApiError, _>(|conn| {
                diesel::insert_into(favorites::table)
                    .values(&NewFavorite {
                        user_id: cook.id,
                        recipe_id,
                    })
                    .execute(conn)
                    .map_err(|e| conflict_on_unique(e, ALREADY_FAVORITED))?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(m) if m == ALREADY_FAVORITED));
    }

    #[test]
    fn test_self_follow_is_rejected() {
        let id = Uuid::new_v4();
        assert_eq!(check_follow_target(id, id), Err(ValidationError::SelfFollow));
    }

    #[test]
    fn test_following_someone_else_passes() {
        assert!(check_follow_target(Uuid::new_v4(), Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_expect_removed() {
        assert!(expect_removed(1, "Favorite").is_ok());
        assert!(matches!(
            expect_removed(0, "Favorite"),
            Err(ApiError::NotFound("Favorite"))
        ));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let lines = vec![SnapshotLine {
            name: "Salt".to_string(),
            unit: "g".to_string(),
            amount: 5,
        }];
        assert_eq!(
            serde_json::to_value(&lines).unwrap(),
            serde_json::json!([{"name": "Salt", "unit": "g", "amount": 5}])
        );
    }
}
