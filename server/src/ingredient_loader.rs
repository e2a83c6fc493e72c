//! One-shot bulk load of the ingredient catalog from a JSON file.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use diesel::prelude::*;

use crate::models::NewIngredient;
use crate::schema::ingredients;

/// Reads a JSON array of `{"name": ..., "measurement_unit": ...}` objects.
pub fn read_file(path: &Path) -> Result<Vec<NewIngredient>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let rows: Vec<NewIngredient> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(rows)
}

/// Drops rows whose (name, unit) pair is already known, either from the
/// catalog or from earlier in the same batch.
pub fn new_rows(
    incoming: Vec<NewIngredient>,
    existing: &HashSet<(String, String)>,
) -> Vec<NewIngredient> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    incoming
        .into_iter()
        .filter(|row| {
            let key = (row.name.clone(), row.measurement_unit.clone());
            !existing.contains(&key) && seen.insert(key)
        })
        .collect()
}

/// Inserts the rows that are not in the catalog yet. Returns how many were created.
pub fn load(conn: &mut PgConnection, incoming: Vec<NewIngredient>) -> QueryResult<usize> {
    conn.transaction(|conn| {
        let existing: HashSet<(String, String)> = ingredients::table
            .select((ingredients::name, ingredients::measurement_unit))
            .load::<(String, String)>(conn)?
            .into_iter()
            .collect();

        let total = incoming.len();
        let rows = new_rows(incoming, &existing);
        tracing::debug!(total, new = rows.len(), "filtered ingredient file against catalog");

        let mut created = 0;
        // Stay well under the Postgres bind-parameter limit
        for chunk in rows.chunks(1000) {
            created += diesel::insert_into(ingredients::table)
                .values(chunk)
                .on_conflict_do_nothing()
                .execute(conn)?;
        }
        Ok(created)
    })
}

pub fn run(conn: &mut PgConnection, path: &Path) -> Result<usize> {
    let rows = read_file(path)?;
    let created = load(conn, rows).context("Failed to insert ingredients")?;
    tracing::info!(created, path = %path.display(), "loaded ingredients");
    Ok(created)
}
