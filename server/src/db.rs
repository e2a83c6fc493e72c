use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::ApiError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../migrations");

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

pub fn create_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .build(manager)
        .context("Failed to create database pool")?;

    // Run pending migrations on startup
    let mut conn = pool
        .get()
        .context("Failed to get DB connection for migrations")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Failed to run database migrations: {e}"))?;
    if !applied.is_empty() {
        tracing::info!(count = applied.len(), "applied database migrations");
    }

    Ok(pool)
}

/// Checks a connection out of the pool for the duration of one request.
pub fn get_conn(pool: &DbPool) -> Result<DbConn, ApiError> {
    pool.get().map_err(ApiError::from)
}

/// Postgres-backed test helpers. Tests that call [`testing::conn`] run only when
/// `TEST_DATABASE_URL` is set and return early otherwise. Each connection
/// works inside a transaction that is never committed.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::LazyLock;

    use diesel::prelude::*;
    use diesel_migrations::MigrationHarness;

    use super::MIGRATIONS;
    use crate::models::{Ingredient, NewIngredient, NewUser, User};
    use crate::schema::{ingredients, users};

    static MIGRATED_URL: LazyLock<Option<String>> = LazyLock::new(|| {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let mut conn = PgConnection::establish(&url).expect("TEST_DATABASE_URL is unreachable");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("failed to migrate test database");
        Some(url)
    });

    pub fn conn() -> Option<PgConnection> {
        let url = MIGRATED_URL.as_ref()?;
        let mut conn = PgConnection::establish(url).expect("TEST_DATABASE_URL is unreachable");
        conn.begin_test_transaction()
            .expect("failed to open test transaction");
        Some(conn)
    }

    /// Inserts a user whose name starts with `prefix`. A random suffix keeps
    /// concurrent tests off each other's unique keys.
    pub fn user(conn: &mut PgConnection, prefix: &str) -> User {
        let username = format!("{prefix}_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        let email = format!("{username}@example.com");
        diesel::insert_into(users::table)
            .values(&NewUser {
                email: &email,
                username: &username,
                first_name: "Test",
                last_name: "User",
                password_hash: "x",
            })
            .returning(User::as_returning())
            .get_result(conn)
            .unwrap()
    }

    pub fn ingredient(conn: &mut PgConnection, name: &str, unit: &str) -> Ingredient {
        diesel::insert_into(ingredients::table)
            .values(&NewIngredient {
                name: name.to_string(),
                measurement_unit: unit.to_string(),
            })
            .returning(Ingredient::as_returning())
            .get_result(conn)
            .unwrap()
    }
}
