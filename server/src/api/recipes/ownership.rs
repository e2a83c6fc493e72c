use diesel::prelude::*;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Recipe, User};
use crate::schema::recipes;

/// Authors may change their own recipes; staff may change any.
pub fn can_edit(user: &User, recipe: &Recipe) -> bool {
    user.is_staff || recipe.author_id == user.id
}

pub fn find_recipe(conn: &mut PgConnection, id: Uuid) -> Result<Recipe, ApiError> {
    recipes::table
        .find(id)
        .select(Recipe::as_select())
        .first(conn)
        .optional()?
        .ok_or(ApiError::NotFound("Recipe"))
}

/// Loads a recipe the caller is allowed to change.
pub fn find_editable(conn: &mut PgConnection, user: &User, id: Uuid) -> Result<Recipe, ApiError> {
    let recipe = find_recipe(conn, id)?;
    if !can_edit(user, &recipe) {
        return Err(ApiError::Forbidden("You can only change your own recipes"));
    }
    Ok(recipe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::users::view::fixtures::{recipe, user};

    #[test]
    fn test_author_can_edit() {
        let author = user("author");
        assert!(can_edit(&author, &recipe(author.id, "Mine")));
    }

    #[test]
    fn test_stranger_cannot_edit() {
        let author = user("author");
        let stranger = user("stranger");
        assert!(!can_edit(&stranger, &recipe(author.id, "Not yours")));
    }

    #[test]
    fn test_staff_can_edit_anything() {
        let author = user("author");
        let mut admin = user("admin");
        admin.is_staff = true;
        assert!(can_edit(&admin, &recipe(author.id, "Moderated")));
    }
}
