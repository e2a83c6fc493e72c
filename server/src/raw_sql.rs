//! Raw SQL fragments that can't be expressed in Diesel's type-safe DSL.
//!
//! # Safety
//!
//! Nothing in this module interpolates user data. Values that come from a
//! request are escaped here and then passed to Diesel as bound parameters.

use diesel::define_sql_function;
use diesel::dsl::sql;
use diesel::expression::SqlLiteral;
use diesel::sql_types::{BigInt, Text};

/// Window function for counting total rows across the full result set.
///
/// Returns `COUNT(*) OVER()` which gives the total count before LIMIT/OFFSET.
/// Diesel doesn't support window functions natively.
pub fn count_over() -> SqlLiteral<BigInt> {
    sql::<BigInt>("COUNT(*) OVER()")
}

define_sql_function! {
    /// PostgreSQL `LOWER(text)`, for case-insensitive equality.
    fn lower(x: Text) -> Text;
}

/// Each author's newest recipes, at most `$2` per author (all when `$2` is NULL).
///
/// Uses `ROW_NUMBER() OVER (PARTITION BY ...)` filtered in an outer query,
/// which Diesel's DSL can't express.
///
/// # Safety
/// The author ids (`$1`, `uuid[]`) and the limit (`$2`, `bigint`) MUST be
/// passed via `.bind()`.
pub const NEWEST_RECIPES_PER_AUTHOR_QUERY: &str = "SELECT id, author_id, title, image, \
    description, preparation_time, created_at, updated_at \
    FROM (SELECT r.*, ROW_NUMBER() OVER ( \
        PARTITION BY r.author_id ORDER BY r.created_at DESC, r.id DESC) AS rn \
        FROM recipes r WHERE r.author_id = ANY($1)) ranked \
    WHERE $2::bigint IS NULL OR rn <= $2::bigint \
    ORDER BY author_id, created_at DESC, id DESC";

/// Escapes `%`, `_` and `\` so user text matches literally inside a LIKE pattern.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// `ILIKE` pattern matching values that start with `prefix`.
pub fn prefix_pattern(prefix: &str) -> String {
    format!("{}%", escape_like(prefix))
}

/// `ILIKE` pattern matching values that contain `needle`.
pub fn contains_pattern(needle: &str) -> String {
    format!("%{}%", escape_like(needle))
}
