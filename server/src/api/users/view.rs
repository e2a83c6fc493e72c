//! Response shapes for users, shared by every endpoint that embeds one.

use std::collections::{HashMap, HashSet};

use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Array, BigInt, Nullable, Uuid as SqlUuid};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::recipes::view::RecipeShort;
use crate::config::Config;
use crate::models::{Recipe, User};
use crate::raw_sql;
use crate::schema::{follows, recipes};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Whether the caller follows this user. Always false for anonymous callers.
    pub is_subscribed: bool,
    /// Absolute avatar URL
    pub avatar: Option<String>,
}

impl UserResponse {
    pub fn new(user: &User, is_subscribed: bool, config: &Config) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed,
            avatar: user.avatar.as_deref().map(|path| config.media_url(path)),
        }
    }
}

/// A followed author together with their newest recipes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthorWithRecipes {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<RecipeShort>,
    /// Total number of recipes by this author, independent of `recipes_limit`
    pub recipes_count: i64,
}

/// Ids among `author_ids` that `viewer` follows.
pub fn followed_among(
    conn: &mut PgConnection,
    viewer: Option<&User>,
    author_ids: &[Uuid],
) -> QueryResult<HashSet<Uuid>> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let ids: Vec<Uuid> = follows::table
        .filter(follows::user_id.eq(viewer.id))
        .filter(follows::author_id.eq_any(author_ids))
        .select(follows::author_id)
        .load(conn)?;
    Ok(ids.into_iter().collect())
}

pub fn user_responses(
    conn: &mut PgConnection,
    config: &Config,
    viewer: Option<&User>,
    users: &[User],
) -> QueryResult<Vec<UserResponse>> {
    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let followed = followed_among(conn, viewer, &ids)?;

    Ok(users
        .iter()
        .map(|u| UserResponse::new(u, followed.contains(&u.id), config))
        .collect())
}

pub fn user_response(
    conn: &mut PgConnection,
    config: &Config,
    viewer: Option<&User>,
    user: &User,
) -> QueryResult<UserResponse> {
    let followed = followed_among(conn, viewer, &[user.id])?;
    Ok(UserResponse::new(user, followed.contains(&user.id), config))
}

/// Groups recipes by author, keeping their order within each author.
pub fn group_by_author(recipes: Vec<Recipe>) -> HashMap<Uuid, Vec<Recipe>> {
    let mut grouped: HashMap<Uuid, Vec<Recipe>> = HashMap::new();
    for recipe in recipes {
        grouped.entry(recipe.author_id).or_default().push(recipe);
    }
    grouped
}

/// Recipe counts per author, one grouped query.
fn recipe_counts(conn: &mut PgConnection, author_ids: &[Uuid]) -> QueryResult<HashMap<Uuid, i64>> {
    let counts: Vec<(Uuid, i64)> = recipes::table
        .filter(recipes::author_id.eq_any(author_ids))
        .group_by(recipes::author_id)
        .select((recipes::author_id, count_star()))
        .load(conn)?;
    Ok(counts.into_iter().collect())
}

/// Each author's newest recipes, at most `limit` per author.
fn newest_recipes(
    conn: &mut PgConnection,
    author_ids: &[Uuid],
    limit: Option<usize>,
) -> QueryResult<Vec<Recipe>> {
    if limit == Some(0) {
        return Ok(Vec::new());
    }
    let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));
    sql_query(raw_sql::NEWEST_RECIPES_PER_AUTHOR_QUERY)
        .bind::<Array<SqlUuid>, _>(author_ids)
        .bind::<Nullable<BigInt>, _>(limit)
        .load(conn)
}

/// Builds subscription cards for authors the viewer follows.
pub fn author_cards(
    conn: &mut PgConnection,
    config: &Config,
    viewer: &User,
    authors: &[User],
    recipes_limit: Option<usize>,
) -> QueryResult<Vec<AuthorWithRecipes>> {
    if authors.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = authors.iter().map(|a| a.id).collect();
    let followed = followed_among(conn, Some(viewer), &ids)?;
    let counts = recipe_counts(conn, &ids)?;
    let mut grouped = group_by_author(newest_recipes(conn, &ids, recipes_limit)?);

    Ok(authors
        .iter()
        .map(|author| AuthorWithRecipes {
            user: UserResponse::new(author, followed.contains(&author.id), config),
            recipes: grouped
                .remove(&author.id)
                .unwrap_or_default()
                .iter()
                .map(|r| RecipeShort::new(r, config))
                .collect(),
            recipes_count: counts.get(&author.id).copied().unwrap_or(0),
        })
        .collect())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;

    use crate::models::{Recipe, User};
    use uuid::Uuid;

    pub fn user(username: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{username}@example.com"),
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password_hash: String::new(),
            avatar: None,
            is_staff: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn recipe(author_id: Uuid, title: &str) -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            author_id,
            title: title.to_string(),
            image: "recipes/images/x.png".to_string(),
            description: "Cook it.".to_string(),
            preparation_time: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{recipe, user};
    use super::*;
    use crate::composition::{save_recipe, IngredientAmount, RecipeFields, RecipeTarget};
    use crate::db::testing;
    use std::path::PathBuf;

    #[test]
    fn test_avatar_becomes_absolute_url() {
        let config = Config::for_tests(PathBuf::from("media"));
        let mut u = user("cook");
        assert_eq!(UserResponse::new(&u, false, &config).avatar, None);

        u.avatar = Some("avatars/a.png".to_string());
        assert_eq!(
            UserResponse::new(&u, true, &config).avatar.as_deref(),
            Some("http://testserver/media/avatars/a.png")
        );
    }

    #[test]
    fn test_group_by_author_keeps_order_within_author() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let recipes = vec![
            recipe(a, "one"),
            recipe(b, "two"),
            recipe(a, "three"),
        ];

        let grouped = group_by_author(recipes);

        let titles: Vec<&str> = grouped[&a].iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["one", "three"]);
        assert_eq!(grouped[&b].len(), 1);
    }

    #[test]
    fn test_author_cards_limit_recipes_but_count_all() {
        let Some(mut conn) = testing::conn() else {
            return;
        };
        let config = Config::for_tests(PathBuf::from("media"));
        let reader = testing::user(&mut conn, "reader");
        let busy = testing::user(&mut conn, "busy");
        let quiet = testing::user(&mut conn, "quiet");
        let salt = testing::ingredient(&mut conn, "Salt", "g");

        for title in ["first", "second", "third"] {
            let id = save_recipe(
                &mut conn,
                RecipeTarget::New {
                    author_id: busy.id,
                    image: "recipes/images/x.png",
                },
                RecipeFields {
                    title,
                    description: "Cook.",
                    preparation_time: 5,
                },
                &[IngredientAmount {
                    id: salt.id,
                    amount: 1,
                }],
            )
            .unwrap();
            // created_at defaults to NOW(), which is fixed inside one transaction
            let offset = match title {
                "first" => 3,
                "second" => 2,
                _ => 1,
            };
            diesel::update(recipes::table.find(id))
                .set(recipes::created_at.eq(chrono::Utc::now() - chrono::Duration::minutes(offset)))
                .execute(&mut conn)
                .unwrap();
        }

        let cards = author_cards(
            &mut conn,
            &config,
            &reader,
            &[busy.clone(), quiet.clone()],
            Some(2),
        )
        .unwrap();

        assert_eq!(cards.len(), 2);
        let titles: Vec<&str> = cards[0].recipes.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second"]);
        assert_eq!(cards[0].recipes_count, 3);
        assert!(cards[1].recipes.is_empty());
        assert_eq!(cards[1].recipes_count, 0);

        let unlimited = author_cards(&mut conn, &config, &reader, &[busy], None).unwrap();
        assert_eq!(unlimited[0].recipes.len(), 3);
    }

    #[test]
    fn test_zero_recipes_limit_keeps_count() {
        let Some(mut conn) = testing::conn() else {
            return;
        };
        let config = Config::for_tests(PathBuf::from("media"));
        let reader = testing::user(&mut conn, "reader");
        let author = testing::user(&mut conn, "author");
        let salt = testing::ingredient(&mut conn, "Salt", "g");
        save_recipe(
            &mut conn,
            RecipeTarget::New {
                author_id: author.id,
                image: "recipes/images/x.png",
            },
            RecipeFields {
                title: "Only",
                description: "Cook.",
                preparation_time: 5,
            },
            &[IngredientAmount {
                id: salt.id,
                amount: 1,
            }],
        )
        .unwrap();

        let cards = author_cards(&mut conn, &config, &reader, &[author], Some(0)).unwrap();
        assert!(cards[0].recipes.is_empty());
        assert_eq!(cards[0].recipes_count, 1);
    }

    #[test]
    fn test_author_card_flattens_user_fields() {
        let config = Config::for_tests(PathBuf::from("media"));
        let author = user("chef");
        let card = AuthorWithRecipes {
            user: UserResponse::new(&author, true, &config),
            recipes: Vec::new(),
            recipes_count: 0,
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["username"], "chef");
        assert_eq!(json["is_subscribed"], true);
        assert_eq!(json["recipes_count"], 0);
    }
}
