//! Recipe composition: validates a recipe together with its ingredient list
//! and writes both in one transaction.
//!
//! Ingredient associations are never patched. Every save deletes the
//! recipe's existing `recipe_ingredients` rows and inserts the submitted list,
//! so after a successful save the stored rows are exactly what was sent.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ValidationError};
use crate::models::{Ingredient, NewRecipe, NewRecipeIngredient, RecipeChanges};
use crate::schema::{ingredients, recipe_ingredients, recipes};

pub const MIN_AMOUNT: i32 = 1;
pub const MAX_AMOUNT: i32 = 32000;
pub const MIN_PREPARATION_TIME: i32 = 1;
pub const MAX_PREPARATION_TIME: i32 = 32000;
pub const MAX_TITLE_LEN: usize = 256;

/// One requested ingredient: catalog id plus quantity in the ingredient's unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub amount: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct RecipeFields<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub preparation_time: i32,
}

/// Which recipe a save applies to.
#[derive(Debug, Clone, Copy)]
pub enum RecipeTarget<'a> {
    New { author_id: Uuid, image: &'a str },
    /// `image` is `None` when the stored image stays as it is.
    Existing {
        recipe_id: Uuid,
        image: Option<&'a str>,
    },
}

pub fn validate_fields(fields: &RecipeFields<'_>) -> Result<(), ValidationError> {
    let title = fields.title.trim();
    if title.is_empty() {
        return Err(ValidationError::field("title", "Title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::field(
            "title",
            format!("Title must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    if fields.description.trim().is_empty() {
        return Err(ValidationError::field(
            "description",
            "Description cannot be empty",
        ));
    }
    if !(MIN_PREPARATION_TIME..=MAX_PREPARATION_TIME).contains(&fields.preparation_time) {
        return Err(ValidationError::field(
            "preparation_time",
            format!(
                "Preparation time must be between {MIN_PREPARATION_TIME} and {MAX_PREPARATION_TIME} minutes"
            ),
        ));
    }
    Ok(())
}

/// Shape checks that need no database: non-empty, no repeated ids, amounts in range.
pub fn validate_ingredient_amounts(items: &[IngredientAmount]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptyOrDuplicateIngredients);
    }

    let mut seen = HashSet::with_capacity(items.len());
    if !items.iter().all(|item| seen.insert(item.id)) {
        return Err(ValidationError::EmptyOrDuplicateIngredients);
    }

    if items
        .iter()
        .any(|item| !(MIN_AMOUNT..=MAX_AMOUNT).contains(&item.amount))
    {
        return Err(ValidationError::InvalidAmount);
    }

    Ok(())
}

/// Builds the association rows, copying each ingredient's current unit.
pub fn build_rows<'a>(
    recipe_id: Uuid,
    items: &[IngredientAmount],
    catalog: &'a HashMap<Uuid, Ingredient>,
) -> Result<Vec<NewRecipeIngredient<'a>>, ValidationError> {
    items
        .iter()
        .map(|item| {
            let ingredient = catalog
                .get(&item.id)
                .ok_or(ValidationError::UnknownIngredient(item.id))?;
            Ok(NewRecipeIngredient {
                recipe_id,
                ingredient_id: item.id,
                amount: item.amount,
                measurement_unit: ingredient.measurement_unit.as_str(),
            })
        })
        .collect()
}

fn load_catalog(
    conn: &mut PgConnection,
    items: &[IngredientAmount],
) -> Result<HashMap<Uuid, Ingredient>, ApiError> {
    let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();

    let found: Vec<Ingredient> = ingredients::table
        .filter(ingredients::id.eq_any(&ids))
        .select(Ingredient::as_select())
        .load(conn)?;

    let catalog: HashMap<Uuid, Ingredient> = found.into_iter().map(|i| (i.id, i)).collect();

    if let Some(missing) = items.iter().find(|item| !catalog.contains_key(&item.id)) {
        return Err(ValidationError::UnknownIngredient(missing.id).into());
    }

    Ok(catalog)
}

/// Validates and persists a recipe and its complete ingredient list.
/// Returns the recipe id.
pub fn save_recipe(
    conn: &mut PgConnection,
    target: RecipeTarget<'_>,
    fields: RecipeFields<'_>,
    items: &[IngredientAmount],
) -> Result<Uuid, ApiError> {
    validate_fields(&fields)?;
    validate_ingredient_amounts(items)?;

    let title = fields.title.trim();

    conn.transaction::<_, ApiError, _>(|conn| {
        let catalog = load_catalog(conn, items)?;

        let recipe_id = match target {
            RecipeTarget::New { author_id, image } => diesel::insert_into(recipes::table)
                .values(&NewRecipe {
                    author_id,
                    title,
                    image,
                    description: fields.description,
                    preparation_time: fields.preparation_time,
                })
                .returning(recipes::id)
                .get_result::<Uuid>(conn)?,
            RecipeTarget::Existing { recipe_id, image } => {
                let updated = diesel::update(recipes::table.find(recipe_id))
                    .set(&RecipeChanges {
                        title,
                        image,
                        description: fields.description,
                        preparation_time: fields.preparation_time,
                        updated_at: Utc::now(),
                    })
                    .execute(conn)?;
                if updated == 0 {
                    return Err(ApiError::NotFound("Recipe"));
                }
                recipe_id
            }
        };

        diesel::delete(
            recipe_ingredients::table.filter(recipe_ingredients::recipe_id.eq(recipe_id)),
        )
        .execute(conn)?;

        let rows = build_rows(recipe_id, items, &catalog)?;
        diesel::insert_into(recipe_ingredients::table)
            .values(&rows)
            .execute(conn)?;

        tracing::debug!(%recipe_id, ingredients = rows.len(), "saved recipe composition");

        Ok(recipe_id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn item(id: Uuid, amount: i32) -> IngredientAmount {
        IngredientAmount { id, amount }
    }

    fn ingredient(name: &str, unit: &str) -> Ingredient {
        Ingredient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        }
    }

    fn fields(title: &str, preparation_time: i32) -> RecipeFields<'_> {
        RecipeFields {
            title,
            description: "Mix and bake.",
            preparation_time,
        }
    }

    #[test]
    fn test_empty_ingredient_list_is_rejected() {
        assert_eq!(
            validate_ingredient_amounts(&[]),
            Err(ValidationError::EmptyOrDuplicateIngredients)
        );
    }

    #[test]
    fn test_duplicate_ids_rejected_regardless_of_amounts() {
        let id = Uuid::new_v4();
        for (a, b) in [(1, 1), (5, 300), (32000, 2)] {
            assert_eq!(
                validate_ingredient_amounts(&[item(id, a), item(Uuid::new_v4(), 10), item(id, b)]),
                Err(ValidationError::EmptyOrDuplicateIngredients)
            );
        }
    }

    #[test]
    fn test_duplicates_win_over_bad_amounts() {
        let id = Uuid::new_v4();
        assert_eq!(
            validate_ingredient_amounts(&[item(id, 0), item(id, -4)]),
            Err(ValidationError::EmptyOrDuplicateIngredients)
        );
    }

    #[test]
    fn test_amount_bounds() {
        assert_eq!(
            validate_ingredient_amounts(&[item(Uuid::new_v4(), 0)]),
            Err(ValidationError::InvalidAmount)
        );
        assert_eq!(
            validate_ingredient_amounts(&[item(Uuid::new_v4(), MAX_AMOUNT + 1)]),
            Err(ValidationError::InvalidAmount)
        );
        assert!(validate_ingredient_amounts(&[
            item(Uuid::new_v4(), MIN_AMOUNT),
            item(Uuid::new_v4(), MAX_AMOUNT)
        ])
        .is_ok());
    }

    #[test]
    fn test_field_validation() {
        assert!(validate_fields(&fields("Pancakes", 15)).is_ok());
        assert!(validate_fields(&fields("   ", 15)).is_err());
        assert!(validate_fields(&fields("Pancakes", 0)).is_err());
        assert!(validate_fields(&fields("Pancakes", MAX_PREPARATION_TIME + 1)).is_err());

        let long_title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(validate_fields(&fields(&long_title, 10)).is_err());

        let empty_description = RecipeFields {
            title: "Pancakes",
            description: "",
            preparation_time: 10,
        };
        assert!(matches!(
            validate_fields(&empty_description),
            Err(ValidationError::InvalidField {
                field: "description",
                ..
            })
        ));
    }

    #[test]
    fn test_rows_copy_unit_from_catalog() {
        let flour = ingredient("flour", "g");
        let milk = ingredient("milk", "ml");
        let catalog: HashMap<Uuid, Ingredient> = [flour.clone(), milk.clone()]
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        let recipe_id = Uuid::new_v4();

        let rows = build_rows(
            recipe_id,
            &[item(flour.id, 200), item(milk.id, 300)],
            &catalog,
        )
        .unwrap();

        assert_eq!(
            rows,
            vec![
                NewRecipeIngredient {
                    recipe_id,
                    ingredient_id: flour.id,
                    amount: 200,
                    measurement_unit: "g",
                },
                NewRecipeIngredient {
                    recipe_id,
                    ingredient_id: milk.id,
                    amount: 300,
                    measurement_unit: "ml",
                },
            ]
        );
    }

    #[test]
    fn test_rows_match_submitted_list_exactly() {
        let catalog: HashMap<Uuid, Ingredient> = (0..5)
            .map(|n| ingredient(&format!("i{n}"), "g"))
            .map(|i| (i.id, i))
            .collect();
        let submitted: Vec<IngredientAmount> = catalog.keys().map(|id| item(*id, 7)).collect();

        let rows = build_rows(Uuid::new_v4(), &submitted, &catalog).unwrap();
        let stored: Vec<IngredientAmount> = rows
            .iter()
            .map(|r| item(r.ingredient_id, r.amount))
            .collect();

        assert_eq!(stored, submitted);
    }

    fn stored_rows(conn: &mut PgConnection, recipe_id: Uuid) -> Vec<(Uuid, i32, String)> {
        let mut rows: Vec<(Uuid, i32, String)> = recipe_ingredients::table
            .filter(recipe_ingredients::recipe_id.eq(recipe_id))
            .select((
                recipe_ingredients::ingredient_id,
                recipe_ingredients::amount,
                recipe_ingredients::measurement_unit,
            ))
            .load(conn)
            .unwrap();
        rows.sort();
        rows
    }

    #[test]
    fn test_update_replaces_stored_ingredient_list() {
        let Some(mut conn) = testing::conn() else {
            return;
        };
        let author = testing::user(&mut conn, "composer");
        let flour = testing::ingredient(&mut conn, "flour", "g");
        let milk = testing::ingredient(&mut conn, "milk", "ml");
        let egg = testing::ingredient(&mut conn, "egg", "pcs");

        let recipe_id = save_recipe(
            &mut conn,
            RecipeTarget::New {
                author_id: author.id,
                image: "recipes/images/a.png",
            },
            fields("Pancakes", 20),
            &[item(flour.id, 200), item(milk.id, 300)],
        )
        .unwrap();

        let saved = save_recipe(
            &mut conn,
            RecipeTarget::Existing {
                recipe_id,
                image: None,
            },
            fields("Pancakes", 25),
            &[item(milk.id, 250), item(egg.id, 2)],
        )
        .unwrap();
        assert_eq!(saved, recipe_id);

        let mut expected = vec![
            (milk.id, 250, "ml".to_string()),
            (egg.id, 2, "pcs".to_string()),
        ];
        expected.sort();
        assert_eq!(stored_rows(&mut conn, recipe_id), expected);
    }

    #[test]
    fn test_failed_update_keeps_previous_list() {
        let Some(mut conn) = testing::conn() else {
            return;
        };
        let author = testing::user(&mut conn, "composer");
        let flour = testing::ingredient(&mut conn, "flour", "g");

        let recipe_id = save_recipe(
            &mut conn,
            RecipeTarget::New {
                author_id: author.id,
                image: "recipes/images/a.png",
            },
            fields("Bread", 60),
            &[item(flour.id, 500)],
        )
        .unwrap();

        let missing = Uuid::new_v4();
        let err = save_recipe(
            &mut conn,
            RecipeTarget::Existing {
                recipe_id,
                image: None,
            },
            fields("Renamed", 60),
            &[item(flour.id, 100), item(missing, 1)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::UnknownIngredient(id)) if id == missing
        ));

        assert_eq!(
            stored_rows(&mut conn, recipe_id),
            vec![(flour.id, 500, "g".to_string())]
        );
        let title: String = recipes::table
            .find(recipe_id)
            .select(recipes::title)
            .first(&mut conn)
            .unwrap();
        assert_eq!(title, "Bread");
    }

    #[test]
    fn test_unknown_ingredient_is_reported() {
        let catalog = HashMap::new();
        let missing = Uuid::new_v4();
        assert_eq!(
            build_rows(Uuid::new_v4(), &[item(missing, 1)], &catalog),
            Err(ValidationError::UnknownIngredient(missing))
        );
    }
}
