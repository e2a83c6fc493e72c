use crate::db::DbPool;
use crate::error::ApiError;
use crate::models::{NewSession, User};
use crate::schema::{sessions, users};
use chrono::{Duration, Utc};
use diesel::prelude::*;

use super::crypto::{generate_token, hash_token};

pub const SESSION_LIFETIME_DAYS: i64 = 30;

/// Deletes every session past its expiry. Returns how many were removed.
pub fn prune_expired_sessions(conn: &mut PgConnection) -> QueryResult<usize> {
    diesel::delete(sessions::table.filter(sessions::expires_at.le(Utc::now()))).execute(conn)
}

/// Opens a new session for `user_id`, clearing out expired ones first.
pub fn create_session(conn: &mut PgConnection, user_id: uuid::Uuid) -> Result<String, ApiError> {
    let pruned = prune_expired_sessions(conn)?;
    if pruned > 0 {
        tracing::debug!(pruned, "removed expired sessions");
    }

    let token = generate_token()
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {e}")))?;
    let token_hash = hash_token(&token);
    let expires_at = Utc::now() + Duration::days(SESSION_LIFETIME_DAYS);

    let new_session = NewSession {
        user_id,
        token_hash: &token_hash,
        expires_at,
    };

    diesel::insert_into(sessions::table)
        .values(&new_session)
        .execute(conn)?;

    Ok(token)
}

/// Removes the session behind `token`. Returns whether a session existed.
pub fn delete_session(conn: &mut PgConnection, token: &str) -> Result<bool, ApiError> {
    let deleted = diesel::delete(sessions::table.filter(sessions::token_hash.eq(hash_token(token))))
        .execute(conn)?;
    Ok(deleted > 0)
}

pub async fn get_user_from_token(pool: &DbPool, token: &str) -> Option<User> {
    let mut conn = pool.get().ok()?;
    let token_hash = hash_token(token);

    sessions::table
        .inner_join(users::table)
        .filter(sessions::token_hash.eq(&token_hash))
        .filter(sessions::expires_at.gt(Utc::now()))
        .select(User::as_select())
        .first(&mut conn)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn session_count(conn: &mut PgConnection, user_id: uuid::Uuid) -> i64 {
        sessions::table
            .filter(sessions::user_id.eq(user_id))
            .count()
            .get_result(conn)
            .unwrap()
    }

    #[test]
    fn test_login_prunes_expired_sessions() {
        let Some(mut conn) = testing::conn() else {
            return;
        };
        let cook = testing::user(&mut conn, "cook");
        let stale_hash = hash_token("stale");
        diesel::insert_into(sessions::table)
            .values(&NewSession {
                user_id: cook.id,
                token_hash: &stale_hash,
                expires_at: Utc::now() - Duration::days(1),
            })
            .execute(&mut conn)
            .unwrap();

        let live = create_session(&mut conn, cook.id).unwrap();
        assert_eq!(session_count(&mut conn, cook.id), 1);

        let remaining: String = sessions::table
            .filter(sessions::user_id.eq(cook.id))
            .select(sessions::token_hash)
            .first(&mut conn)
            .unwrap();
        assert_eq!(remaining, hash_token(&live));
    }

    #[test]
    fn test_pruning_keeps_live_sessions() {
        let Some(mut conn) = testing::conn() else {
            return;
        };
        let cook = testing::user(&mut conn, "cook");
        create_session(&mut conn, cook.id).unwrap();
        create_session(&mut conn, cook.id).unwrap();

        prune_expired_sessions(&mut conn).unwrap();
        assert_eq!(session_count(&mut conn, cook.id), 2);
    }
}
